//! HTML map rendering
//!
//! Produces a standalone Leaflet page: the fence circle, a target marker,
//! one coloured circle marker per classified device (at its first recorded
//! position) and a legend. A device in several categories gets one marker
//! per category.

use crate::domain::{Category, ClassificationReport, GeofenceSpec};
use serde::Serialize;
use std::path::Path;
use tracing::info;

const ZOOM_START: u8 = 15;
const MARKER_RADIUS_PX: u8 = 5;
const FENCE_COLOR: &str = "red";

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>__TITLE__</title>
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
html, body, #map { height: 100%; margin: 0; }
.legend { position: fixed; bottom: 30px; left: 30px; width: 180px;
  background-color: white; border: 2px solid grey; z-index: 9999; font-size: 14px;
  box-shadow: 2px 2px 5px rgba(0,0,0,0.4); padding: 10px; }
.legend i { font-style: normal; }
</style>
</head>
<body>
<div id="map"></div>
<div class="legend">
<b>Legend</b><br>
__LEGEND__</div>
<script>
const data = __DATA__;
const map = L.map('map').setView(data.center, data.zoom);
L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
  maxZoom: 19,
  attribution: '&copy; OpenStreetMap contributors'
}).addTo(map);
L.circle(data.center, {
  radius: data.radius, color: data.fence_color, fill: true, fillOpacity: 0.2
}).bindPopup('Target Area').addTo(map);
L.marker(data.center).bindPopup('Target Location').addTo(map);
for (const m of data.markers) {
  L.circleMarker([m.lat, m.lon], {
    radius: data.marker_radius, color: m.color, fill: true, fillColor: m.color, fillOpacity: 0.9
  }).bindPopup(m.popup).addTo(map);
}
</script>
</body>
</html>
"#;

#[derive(Debug, Serialize)]
struct MarkerData {
    lat: f64,
    lon: f64,
    color: &'static str,
    popup: String,
}

#[derive(Debug, Serialize)]
struct MapData {
    center: [f64; 2],
    zoom: u8,
    radius: f64,
    fence_color: &'static str,
    marker_radius: u8,
    markers: Vec<MarkerData>,
}

/// Escape text for inclusion in HTML
fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

/// Renders classification results onto a map page
pub struct MapRenderer {
    title: String,
}

impl MapRenderer {
    pub fn new(title: &str) -> Self {
        Self { title: title.to_string() }
    }

    fn legend() -> String {
        let mut legend = format!(
            "<i style=\"color:{FENCE_COLOR};\">&#11044;</i> Target Circle<br>\n"
        );
        for category in Category::ALL {
            legend.push_str(&format!(
                "<i style=\"color:{};\">&#11044;</i> {}<br>\n",
                category.color(),
                category.label()
            ));
        }
        legend
    }

    fn markers(report: &ClassificationReport) -> Vec<MarkerData> {
        Category::ALL
            .into_iter()
            .flat_map(|category| {
                report.in_category(category).map(move |d| MarkerData {
                    lat: d.first_point.latitude,
                    lon: d.first_point.longitude,
                    color: category.color(),
                    popup: escape_html(&format!("{}: {}", category.label(), d.device_id)),
                })
            })
            .collect()
    }

    /// Render the page as a string
    pub fn render(
        &self,
        fence: &GeofenceSpec,
        report: &ClassificationReport,
    ) -> serde_json::Result<String> {
        let center = fence.center();
        let data = MapData {
            center: [center.latitude, center.longitude],
            zoom: ZOOM_START,
            radius: fence.radius_meters(),
            fence_color: FENCE_COLOR,
            marker_radius: MARKER_RADIUS_PX,
            markers: Self::markers(report),
        };

        // "</script>" must not appear inside the script block
        let json = serde_json::to_string(&data)?.replace('<', "\\u003c");

        Ok(PAGE_TEMPLATE
            .replace("__TITLE__", &escape_html(&self.title))
            .replace("__LEGEND__", &Self::legend())
            .replace("__DATA__", &json))
    }

    /// Render and write the page, creating parent directories
    pub fn write<P: AsRef<Path>>(
        &self,
        path: P,
        fence: &GeofenceSpec,
        report: &ClassificationReport,
    ) -> std::io::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let html = self.render(fence, report)?;
        std::fs::write(path, &html)?;
        info!(path = %path.display(), bytes = %html.len(), "map_written");
        Ok(())
    }
}

impl Default for MapRenderer {
    fn default() -> Self {
        Self::new("Geofence Classification")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DeviceClassification, DeviceId, GeoPoint};

    fn fence() -> GeofenceSpec {
        GeofenceSpec::new(GeoPoint::new(32.86783735156178, 74.25641198819648), 500.0).unwrap()
    }

    fn report(entries: &[(&str, &[Category])]) -> ClassificationReport {
        let mut report = ClassificationReport::new();
        for (id, cats) in entries {
            let d = DeviceClassification {
                device_id: DeviceId::from(*id),
                categories: cats.iter().copied().collect(),
                first_point: GeoPoint::new(32.87, 74.26),
                observations: 2,
            };
            report.devices.insert(d.device_id.clone(), d);
        }
        report
    }

    fn embedded_data(html: &str) -> serde_json::Value {
        let start = html.find("const data = ").unwrap() + "const data = ".len();
        let end = start + html[start..].find(";\n").unwrap();
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[test]
    fn test_render_fence_and_markers() {
        let report = report(&[
            ("10.0.0.1", &[Category::Inbound, Category::Outbound]),
            ("10.0.0.2", &[Category::StayedIn]),
            ("10.0.0.3", &[]),
        ]);
        let html = MapRenderer::default().render(&fence(), &report).unwrap();
        let data = embedded_data(&html);

        assert_eq!(data["radius"], 500.0);
        assert_eq!(data["center"][0], 32.86783735156178);
        assert_eq!(data["zoom"], 15);

        let markers = data["markers"].as_array().unwrap();
        assert_eq!(markers.len(), 3);
        assert_eq!(markers[0]["color"], "blue");
        assert_eq!(markers[0]["popup"], "Inbound IP: 10.0.0.1");
        assert_eq!(markers[1]["color"], "green");
        assert_eq!(markers[2]["color"], "orange");
        assert_eq!(markers[2]["popup"], "Stayed-in IP: 10.0.0.2");
    }

    #[test]
    fn test_legend_lists_categories() {
        let html = MapRenderer::default().render(&fence(), &ClassificationReport::new()).unwrap();
        assert!(html.contains("Target Circle"));
        assert!(html.contains("Inbound IP"));
        assert!(html.contains("Outbound IP"));
        assert!(html.contains("Stayed-in IP"));
        assert_eq!(embedded_data(&html)["markers"], serde_json::json!([]));
    }

    #[test]
    fn test_device_ids_escaped() {
        let report = report(&[("</script><b>", &[Category::StayedIn])]);
        let html = MapRenderer::default().render(&fence(), &report).unwrap();
        assert!(!html.contains("</script><b>"));
        let data = embedded_data(&html);
        assert_eq!(data["markers"][0]["popup"], "Stayed-in IP: &lt;/script&gt;&lt;b&gt;");
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps").join("map.html");
        MapRenderer::default().write(&path, &fence(), &ClassificationReport::new()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
