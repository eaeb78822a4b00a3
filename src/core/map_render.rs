//! Leaflet 地图文档渲染（可直接嵌入前端 iframe）。

use serde_json::json;
use uuid::Uuid;

use crate::models::result_set::{cell_f64, cell_text, ResultSet};

pub const UNFOCUSED_ZOOM: u8 = 6;

const POPUP_FIELDS: [&str; 4] = ["time", "depth", "temperature", "salinity"];

#[derive(Debug, Clone, PartialEq)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    pub popup: Vec<(String, String)>,
}

/// 带边距的点位范围 `[[south, west], [north, east]]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddedBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

#[derive(Debug, Clone)]
pub struct MapDocument {
    pub html: String,
    /// 是否聚焦到实际数据点
    pub focused: bool,
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// 从结果集取出坐标有效的点，坐标不是数值的行直接跳过
pub fn points_from_result_set(rs: &ResultSet) -> Vec<MapPoint> {
    let lat_idx = rs.column_index("latitude");
    let lon_idx = rs.column_index("longitude");
    let (Some(lat_idx), Some(lon_idx)) = (lat_idx, lon_idx) else {
        return Vec::new();
    };
    rs.rows
        .iter()
        .filter_map(|row| {
            let lat = row.get(lat_idx).and_then(cell_f64)?;
            let lon = row.get(lon_idx).and_then(cell_f64)?;
            let popup = POPUP_FIELDS
                .iter()
                .map(|field| {
                    let val = rs.cell(row, field).map(cell_text).unwrap_or_default();
                    (field.to_string(), val)
                })
                .collect();
            Some(MapPoint { lat, lon, popup })
        })
        .collect()
}

pub fn padded_bounds(points: &[MapPoint], padding: f64) -> Option<PaddedBounds> {
    let first = points.first()?;
    let mut b = PaddedBounds {
        south: first.lat,
        west: first.lon,
        north: first.lat,
        east: first.lon,
    };
    for p in points {
        b.south = b.south.min(p.lat);
        b.north = b.north.max(p.lat);
        b.west = b.west.min(p.lon);
        b.east = b.east.max(p.lon);
    }
    Some(PaddedBounds {
        south: b.south - padding,
        west: b.west - padding,
        north: b.north + padding,
        east: b.east + padding,
    })
}

fn document(body_script: &str) -> String {
    let map_id = format!("map_{}", Uuid::new_v4().simple());
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1.0" />
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.css" />
<link rel="stylesheet" href="https://unpkg.com/leaflet.markercluster@1.5.3/dist/MarkerCluster.Default.css" />
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<script src="https://unpkg.com/leaflet.markercluster@1.5.3/dist/leaflet.markercluster.js"></script>
<style>html, body {{ height: 100%; margin: 0; }} #{map_id} {{ width: 100%; height: 100%; }}</style>
</head>
<body>
<div id="{map_id}"></div>
<script>
{body_script}
</script>
</body>
</html>
"#,
        map_id = map_id,
        body_script = body_script.replace("__MAP_ID__", &map_id),
    )
}

const TILE_LAYER: &str = concat!(
    "L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', ",
    "{ attribution: '&copy; OpenStreetMap contributors' }).addTo(map);",
);

/// 无数据时的回退地图：只居中，不聚焦任何点
pub fn render_unfocused(center_lat: f64, center_lon: f64, zoom: u8) -> MapDocument {
    let script = format!(
        "var map = L.map('__MAP_ID__').setView([{center_lat}, {center_lon}], {zoom});\n{tile}",
        tile = TILE_LAYER,
    );
    MapDocument { html: document(&script), focused: false }
}

/// 聚合标注地图，中心为点位均值，视野适配带边距的范围
pub fn render_points(points: &[MapPoint], padding: f64) -> Option<MapDocument> {
    let bounds = padded_bounds(points, padding)?;
    let n = points.len() as f64;
    let center_lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let center_lon = points.iter().map(|p| p.lon).sum::<f64>() / n;

    let markers: Vec<_> = points
        .iter()
        .map(|p| {
            let popup = p
                .popup
                .iter()
                .map(|(k, v)| format!("{}: {}", escape_html(k), escape_html(v)))
                .collect::<Vec<_>>()
                .join("<br>");
            json!([p.lat, p.lon, popup])
        })
        .collect();
    // 序列化后的 JSON 直接嵌入 <script>，防止 "</script>" 提前闭合
    let markers_json = serde_json::Value::Array(markers).to_string().replace("</", "<\\/");

    let script = format!(
        "var map = L.map('__MAP_ID__').setView([{center_lat}, {center_lon}], {zoom});
{tile}
var cluster = L.markerClusterGroup().addTo(map);
var markers = {markers_json};
markers.forEach(function (m) {{ L.marker([m[0], m[1]]).bindPopup(m[2]).addTo(cluster); }});
map.fitBounds([[{south}, {west}], [{north}, {east}]]);",
        south = bounds.south,
        west = bounds.west,
        north = bounds.north,
        east = bounds.east,
        zoom = UNFOCUSED_ZOOM,
        tile = TILE_LAYER,
    );
    Some(MapDocument { html: document(&script), focused: true })
}
