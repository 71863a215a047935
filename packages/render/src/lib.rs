#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Generates the heatmap page.
//!
//! The output is a single HTML document that pulls Leaflet, Leaflet.heat and
//! Leaflet.awesome-markers from a CDN. All map data (heat layers, facility
//! markers, view settings) is embedded as one JSON block read by a small
//! inline script; the per-district table is plain HTML.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use aedes_map_district_models::DistrictCounts;
use aedes_map_facility::Facility;
use aedes_map_occurrence_models::Occurrence;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MAP_SCRIPT: &str = include_str!("map.js");

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";
const LEAFLET_HEAT_JS: &str = "https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js";
const AWESOME_MARKERS_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.css";
const AWESOME_MARKERS_JS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/Leaflet.awesome-markers/2.0.2/leaflet.awesome-markers.js";
const GLYPHICONS_CSS: &str =
    "https://netdna.bootstrapcdn.com/bootstrap/3.0.0/css/bootstrap-glyphicons.css";

/// Title of the per-district summary table.
pub const TABLE_TITLE: &str = "Ocorrências por Bairro";

/// Errors that can occur while generating or writing the page.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The output file could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedded map data could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Formatting into the output buffer failed.
    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Base map view and tile source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOptions {
    /// Center used when there are no located occurrences, as
    /// `[latitude, longitude]`.
    pub default_center: [f64; 2],
    pub zoom: u8,
    pub tile_url: String,
    pub tile_attribution: String,
    /// Document title.
    pub title: String,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            default_center: [-23.572, -46.630],
            zoom: 13,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            tile_attribution: "&copy; OpenStreetMap contributors".to_string(),
            title: "Mapa de calor de arboviroses".to_string(),
        }
    }
}

/// Leaflet.heat layer styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapStyle {
    /// Gradient stops (`"0.2"` .. `"1.0"`) to CSS colors.
    pub gradient: BTreeMap<String, String>,
    pub radius: u32,
    pub blur: u32,
    pub min_opacity: f64,
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self {
            gradient: [
                ("0.2", "#3a7ee7"),
                ("0.5", "#6ed8e7"),
                ("0.8", "#ffff66"),
                ("1.0", "#ff0000"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            radius: 35,
            blur: 18,
            min_opacity: 0.1,
        }
    }
}

/// One heatmap overlay: every located occurrence of a single disease.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatLayer {
    /// Disease label as it appears in the data.
    pub label: String,
    /// `[latitude, longitude, weight]` triples.
    pub points: Vec<[f64; 3]>,
}

impl HeatLayer {
    /// Layer control name, e.g. `"Dengue (12)"`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{} ({})", self.label, self.points.len())
    }
}

/// Everything drawn on the map.
#[derive(Debug, Clone, Copy)]
pub struct MapContent<'a> {
    pub occurrences: &'a [Occurrence],
    pub facilities: &'a [Facility],
    pub counts: &'a DistrictCounts,
}

#[derive(Serialize)]
struct TilesData<'a> {
    url: &'a str,
    attribution: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HeatData<'a> {
    radius: u32,
    blur: u32,
    min_opacity: f64,
    gradient: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct LayerData {
    name: String,
    points: Vec<[f64; 3]>,
}

#[derive(Serialize)]
struct FacilityData {
    name: String,
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct MapData<'a> {
    center: [f64; 2],
    zoom: u8,
    tiles: TilesData<'a>,
    heat: HeatData<'a>,
    layers: Vec<LayerData>,
    facilities: Vec<FacilityData>,
}

/// Groups located occurrences by disease label, sorted by label. Each point
/// has weight 1.
#[must_use]
pub fn heat_layers(occurrences: &[Occurrence]) -> Vec<HeatLayer> {
    let mut by_label: BTreeMap<&str, Vec<[f64; 3]>> = BTreeMap::new();
    for occurrence in occurrences {
        if let Some(c) = occurrence.coordinates {
            by_label
                .entry(occurrence.disease.as_str())
                .or_default()
                .push([c.latitude, c.longitude, 1.0]);
        }
    }

    by_label
        .into_iter()
        .map(|(label, points)| HeatLayer {
            label: label.to_string(),
            points,
        })
        .collect()
}

/// Mean position of the located occurrences, or `default` when none are
/// located.
#[must_use]
pub fn map_center(occurrences: &[Occurrence], default: [f64; 2]) -> [f64; 2] {
    let (sum_lat, sum_lon, n) = occurrences
        .iter()
        .filter_map(|o| o.coordinates)
        .fold((0.0, 0.0, 0_u32), |(lat, lon, n), c| {
            (lat + c.latitude, lon + c.longitude, n + 1)
        });

    if n == 0 {
        default
    } else {
        let n = f64::from(n);
        [sum_lat / n, sum_lon / n]
    }
}

/// Escapes text for use in HTML element content and attribute values.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Serializes `value` for embedding inside a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

/// Renders the full HTML document.
///
/// # Errors
///
/// Returns [`RenderError`] if the map data cannot be serialized.
pub fn render_map(
    content: MapContent<'_>,
    options: &MapOptions,
    style: &HeatmapStyle,
) -> Result<String, RenderError> {
    let layers = heat_layers(content.occurrences);
    log::debug!("Rendering {} heat layer(s)", layers.len());

    let data = MapData {
        center: map_center(content.occurrences, options.default_center),
        zoom: options.zoom,
        tiles: TilesData {
            url: &options.tile_url,
            attribution: &options.tile_attribution,
        },
        heat: HeatData {
            radius: style.radius,
            blur: style.blur,
            min_opacity: style.min_opacity,
            gradient: &style.gradient,
        },
        layers: layers
            .iter()
            .map(|l| LayerData {
                name: escape_html(&l.name()),
                points: l.points.clone(),
            })
            .collect(),
        facilities: content
            .facilities
            .iter()
            .map(|f| FacilityData {
                name: escape_html(&f.name),
                lat: f.latitude,
                lon: f.longitude,
            })
            .collect(),
    };

    let mut buf = String::with_capacity(8192);

    writeln!(buf, "<!DOCTYPE html>")?;
    writeln!(buf, "<html lang=\"pt-BR\">")?;
    writeln!(buf, "<head>")?;
    writeln!(buf, "<meta charset=\"utf-8\"/>")?;
    writeln!(
        buf,
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\"/>"
    )?;
    writeln!(buf, "<title>{}</title>", escape_html(&options.title))?;
    for css in [LEAFLET_CSS, GLYPHICONS_CSS, AWESOME_MARKERS_CSS] {
        writeln!(buf, "<link rel=\"stylesheet\" href=\"{css}\"/>")?;
    }
    for js in [LEAFLET_JS, LEAFLET_HEAT_JS, AWESOME_MARKERS_JS] {
        writeln!(buf, "<script src=\"{js}\"></script>")?;
    }
    writeln!(
        buf,
        "<style>html, body {{ width: 100%; height: 100%; margin: 0; padding: 0; }} #map {{ position: absolute; top: 0; bottom: 0; right: 0; left: 0; }}</style>"
    )?;
    writeln!(buf, "</head>")?;
    writeln!(buf, "<body>")?;
    writeln!(buf, "<div id=\"map\"></div>")?;
    write_table(&mut buf, content.counts)?;
    writeln!(
        buf,
        "<script type=\"application/json\" id=\"map-data\">{}</script>",
        script_json(&data)?
    )?;
    writeln!(buf, "<script>\n{MAP_SCRIPT}</script>")?;
    writeln!(buf, "</body>")?;
    writeln!(buf, "</html>")?;

    Ok(buf)
}

/// Fixed bottom-left summary: one row per target district plus a bold
/// total.
fn write_table(buf: &mut String, counts: &DistrictCounts) -> std::fmt::Result {
    const CELL: &str = "padding: 2px 6px; border-bottom: 1px solid #ddd;";
    const TOTAL_CELL: &str = "padding: 2px 6px; border-top: 2px solid #666;";

    writeln!(
        buf,
        "<div id=\"district-table\" style=\"position: fixed; bottom: 10px; left: 10px; z-index: 9999; background-color: rgba(255, 255, 255, 0.8); padding: 8px; border: 1px solid #444; font-size: 12px;\">"
    )?;
    writeln!(buf, "  <b>{}</b>", escape_html(TABLE_TITLE))?;
    writeln!(
        buf,
        "  <table style=\"border-collapse: collapse; margin-top: 4px;\">"
    )?;
    writeln!(
        buf,
        "    <tr><th style=\"padding: 2px 6px; border-bottom: 1px solid #666;\">Bairro</th><th style=\"padding: 2px 6px; border-bottom: 1px solid #666;\">Qtd.</th></tr>"
    )?;
    for row in &counts.rows {
        writeln!(
            buf,
            "    <tr><td style=\"{CELL}\">{}</td><td style=\"{CELL} text-align: right;\">{}</td></tr>",
            escape_html(&row.name),
            row.count
        )?;
    }
    writeln!(
        buf,
        "    <tr><td style=\"{TOTAL_CELL}\"><b>Total</b></td><td style=\"{TOTAL_CELL} text-align: right;\"><b>{}</b></td></tr>",
        counts.total()
    )?;
    writeln!(buf, "  </table>")?;
    writeln!(buf, "</div>")
}

/// Writes `html` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`RenderError::Io`] if the file cannot be written.
pub fn write_html(path: &Path, html: &str) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    log::info!("Wrote map to {}", path.display());
    Ok(())
}
