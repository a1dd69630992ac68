//! Extraction of drawable primitives from a joined frame result.
//!
//! Results are loosely typed JSON. Anything unrecognized is skipped rather
//! than failing the whole overlay.

use serde_json::Value;

use crate::telemetry::FrameResult;
use crate::types::{Color, GeometryTool, ModuleError, OverlayPoint, ToolKind};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayFrame {
    pub points: Vec<OverlayPoint>,
    pub connections: Vec<(String, String)>,
    pub tools: Vec<GeometryTool>,
    pub errors: Vec<ModuleError>,
}

impl OverlayFrame {
    pub fn from_result(result: &FrameResult) -> Self {
        let results = result.results.as_ref();
        Self {
            points: results.map(extract_points).unwrap_or_default(),
            connections: results.map(extract_connections).unwrap_or_default(),
            tools: results.map(extract_tools).unwrap_or_default(),
            errors: result.errors.clone(),
        }
    }
}

/// Point and tool ids arrive as numbers or strings; both compare as strings.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_points(results: &Value) -> Vec<OverlayPoint> {
    let Some(keypoints) = results.pointer("/vision/keypoints") else {
        return Vec::new();
    };

    match keypoints {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                let source_id = item
                    .get("id")
                    .cloned()
                    .unwrap_or_else(|| Value::from(idx));
                parse_point(item, source_id)
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(key, item)| {
                let source_id = item
                    .get("id")
                    .cloned()
                    .unwrap_or_else(|| Value::String(key.clone()));
                parse_point(item, source_id)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_point(item: &Value, source_id: Value) -> Option<OverlayPoint> {
    let id = id_string(&source_id)?;
    let x = item.get("x")?.as_f64()? as f32;
    let y = item.get("y")?.as_f64()? as f32;
    let color = item
        .get("color")
        .and_then(Value::as_str)
        .and_then(Color::from_css)
        .unwrap_or(Color::POINT_DEFAULT);
    let label = item
        .get("label")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());
    Some(OverlayPoint {
        id,
        source_id,
        x,
        y,
        color,
        label,
    })
}

fn extract_connections(results: &Value) -> Vec<(String, String)> {
    results
        .pointer("/overlay/connections")
        .and_then(Value::as_array)
        .map(|pairs| {
            pairs
                .iter()
                .filter_map(|pair| {
                    let pair = pair.as_array()?;
                    Some((id_string(pair.first()?)?, id_string(pair.get(1)?)?))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn extract_tools(results: &Value) -> Vec<GeometryTool> {
    let Some(geometry) = results
        .pointer("/overlay/geometry")
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    geometry
        .iter()
        .filter_map(|(id, tool)| {
            let kind = ToolKind::parse(tool.get("type")?.as_str()?)?;
            let point_ids = tool
                .get("points")?
                .as_array()?
                .iter()
                .filter_map(id_string)
                .collect();
            let color = tool
                .get("color")
                .and_then(Value::as_str)
                .and_then(Color::from_css)
                .unwrap_or(Color::TOOL_DEFAULT);
            let current_value = tool.get("current").and_then(Value::as_f64).unwrap_or(0.0);
            let unit = tool
                .get("unit")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            Some(GeometryTool {
                id: id.clone(),
                kind,
                point_ids,
                color,
                current_value,
                unit,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn result_with(results: Value) -> FrameResult {
        FrameResult {
            camera_id: 0,
            frame_id: 1,
            results: Some(results),
            errors: vec![],
            active_plugins: Value::Null,
            camera_config: Value::Null,
        }
    }

    #[test]
    fn keypoints_as_list_or_map() {
        let list = result_with(json!({"vision": {"keypoints": [
            {"id": 3, "x": 10.0, "y": 20.0, "label": "Hip", "color": "#ff0000"},
            {"id": "knee", "x": 11, "y": 21}
        ]}}));
        let overlay = OverlayFrame::from_result(&list);
        assert_eq!(overlay.points.len(), 2);
        assert_eq!(overlay.points[0].id, "3");
        assert_eq!(overlay.points[0].source_id, json!(3));
        assert_eq!(overlay.points[0].color, Color([255, 0, 0, 255]));
        assert_eq!(overlay.points[1].label, "knee");
        assert_eq!(overlay.points[1].color, Color::POINT_DEFAULT);

        let map = result_with(json!({"vision": {"keypoints": {
            "7": {"x": 1.0, "y": 2.0},
            "bad": {"x": "nope", "y": 2.0}
        }}}));
        let overlay = OverlayFrame::from_result(&map);
        assert_eq!(overlay.points.len(), 1);
        assert_eq!(overlay.points[0].id, "7");
    }

    #[test]
    fn tools_and_connections() {
        let result = result_with(json!({"overlay": {
            "geometry": {
                "tool_1": {"type": "distance", "points": [1, 2], "current": 41.6, "unit": "px"},
                "tool_2": {"type": "angle", "points": [1, 2, 3], "color": "#fbbf24"},
                "tool_3": {"type": "ellipse", "points": [1]}
            },
            "connections": [[1, 2], ["2", "3"], [1]]
        }}));
        let overlay = OverlayFrame::from_result(&result);

        assert_eq!(overlay.tools.len(), 2);
        let distance = overlay.tools.iter().find(|t| t.id == "tool_1").unwrap();
        assert_eq!(distance.kind, ToolKind::Distance);
        assert_eq!(distance.point_ids, vec!["1", "2"]);
        assert_eq!(distance.color, Color::TOOL_DEFAULT);
        let angle = overlay.tools.iter().find(|t| t.id == "tool_2").unwrap();
        assert_eq!(angle.current_value, 0.0);
        assert_eq!(angle.color, Color::TOOL_CREATED);

        assert_eq!(
            overlay.connections,
            vec![
                ("1".to_string(), "2".to_string()),
                ("2".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn absent_results_give_empty_overlay() {
        let mut result = result_with(json!({}));
        result.results = None;
        result.errors = vec![ModuleError {
            source: "pose".into(),
            message: "model missing".into(),
            severity: "error".into(),
        }];
        let overlay = OverlayFrame::from_result(&result);
        assert!(overlay.points.is_empty());
        assert_eq!(overlay.errors.len(), 1);
    }
}
