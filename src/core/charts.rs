use chrono::NaiveDateTime;
use serde::Serialize;

use crate::core::map_render::escape_html;
use crate::models::result_set::{cell_f64, parse_time_value, ResultSet};

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN: f64 = 60.0;

/// 一张时间序列折线图（独立 SVG 文档）
#[derive(Debug, Clone, Serialize)]
pub struct Chart {
    pub title: String,
    pub series: String,
    pub svg: String,
}

struct SeriesSpec {
    column: &'static str,
    label: &'static str,
    color: &'static str,
}

const SERIES: [SeriesSpec; 2] = [
    SeriesSpec { column: "salinity", label: "Salinity", color: "blue" },
    SeriesSpec { column: "temperature", label: "Temperature", color: "red" },
];

/// 盐度、温度各一张图；没有 time 列时不出图
pub fn plot_time_series(rs: &ResultSet) -> Vec<Chart> {
    let Some(time_idx) = rs.column_index("time") else {
        return Vec::new();
    };

    // 丢弃无法解析时间的行
    let timed: Vec<(NaiveDateTime, &Vec<serde_json::Value>)> = rs
        .rows
        .iter()
        .filter_map(|row| row.get(time_idx).and_then(parse_time_value).map(|t| (t, row)))
        .collect();

    SERIES
        .iter()
        .filter_map(|spec| {
            let idx = rs.column_index(spec.column)?;
            let points: Vec<(NaiveDateTime, f64)> = timed
                .iter()
                .filter_map(|(t, row)| row.get(idx).and_then(cell_f64).map(|v| (*t, v)))
                .collect();
            let title = format!("{} vs Time", spec.label);
            Some(Chart {
                svg: render_line_chart(&title, spec.label, spec.color, &points),
                title,
                series: spec.column.to_string(),
            })
        })
        .collect()
}

fn span(min: f64, max: f64) -> (f64, f64) {
    if (max - min).abs() < f64::EPSILON {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

fn render_line_chart(
    title: &str,
    y_label: &str,
    color: &str,
    points: &[(NaiveDateTime, f64)],
) -> String {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|(t, _)| *t);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}">
<rect width="100%" height="100%" fill="white"/>
<text x="{cx}" y="24" text-anchor="middle" font-size="16">{title}</text>
<text x="{cx}" y="{xl}" text-anchor="middle" font-size="12">Time</text>
<text x="16" y="{cy}" text-anchor="middle" font-size="12" transform="rotate(-90 16 {cy})">{y_label}</text>
<line x1="{MARGIN}" y1="{bottom}" x2="{right}" y2="{bottom}" stroke="black"/>
<line x1="{MARGIN}" y1="{MARGIN}" x2="{MARGIN}" y2="{bottom}" stroke="black"/>
"#,
        cx = WIDTH / 2.0,
        cy = HEIGHT / 2.0,
        xl = HEIGHT - 12.0,
        bottom = HEIGHT - MARGIN,
        right = WIDTH - MARGIN,
        title = escape_html(title),
        y_label = escape_html(y_label),
    );

    if let (Some(first), Some(last)) = (sorted.first(), sorted.last()) {
        let t0 = first.0.and_utc().timestamp() as f64;
        let t1 = last.0.and_utc().timestamp() as f64;
        let (t_min, t_max) = span(t0, t1);
        let v_min = sorted.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
        let v_max = sorted.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        let (v_min, v_max) = span(v_min, v_max);

        let plot_w = WIDTH - 2.0 * MARGIN;
        let plot_h = HEIGHT - 2.0 * MARGIN;
        let coords: Vec<String> = sorted
            .iter()
            .map(|(t, v)| {
                let elapsed = t.and_utc().timestamp() as f64 - t_min;
                let x = MARGIN + elapsed / (t_max - t_min) * plot_w;
                let y = HEIGHT - MARGIN - (v - v_min) / (v_max - v_min) * plot_h;
                format!("{x:.1},{y:.1}")
            })
            .collect();

        svg.push_str(&format!(
            r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" points="{}"/>
<text x="{MARGIN}" y="{label_y}" font-size="10">{}</text>
<text x="{right}" y="{label_y}" font-size="10" text-anchor="end">{}</text>
<text x="{tick_x}" y="{bottom}" font-size="10" text-anchor="end">{v_min:.2}</text>
<text x="{tick_x}" y="{top}" font-size="10" text-anchor="end">{v_max:.2}</text>
"#,
            coords.join(" "),
            first.0.format("%Y-%m-%d %H:%M"),
            last.0.format("%Y-%m-%d %H:%M"),
            label_y = HEIGHT - MARGIN + 16.0,
            right = WIDTH - MARGIN,
            tick_x = MARGIN - 4.0,
            bottom = HEIGHT - MARGIN,
            top = MARGIN,
        ));
    }

    svg.push_str("</svg>\n");
    svg
}
