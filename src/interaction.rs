//! Pointer interaction over the composited video: the point context menu and
//! multi-click tool creation.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};

use crate::render::{CompositeRenderer, Letterbox};
use crate::telemetry::connection::{Command, CommandSink};
use crate::types::{Color, OverlayPoint, ToolKind};

pub const GEOMETRY_TARGET: &str = "geometry_manager";
pub const CMD_ADD_TOOL: &str = "cmd_add_tool";
pub const CMD_REMOVE_BY_POINT: &str = "cmd_remove_by_point";
pub const CMD_REMOVE_TOOL: &str = "cmd_remove_tool";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    MeasureDistance,
    MeasureAngle,
    StopMeasurements,
}

/// Points gathered so far for a tool the user is creating.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCreationSession {
    pub kind: ToolKind,
    pub collected: Vec<OverlayPoint>,
    pub step: usize,
}

impl ToolCreationSession {
    fn contains(&self, point_id: &str) -> bool {
        self.collected.iter().any(|p| p.id == point_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    MenuOpen {
        /// Container coordinates where the menu is anchored.
        anchor: (f32, f32),
        point: OverlayPoint,
    },
    Collecting(ToolCreationSession),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    MenuDismissed,
    MenuOpened,
    /// Nothing under the pointer while idle; handed back to the host.
    EmptyClick { x: f32, y: f32 },
    OutsideVideo,
    PointCollected { step: usize },
    ToolCreated { tool_id: String },
    /// Collecting, but the click missed or hit an already chosen point.
    Ignored,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    state: InteractionState,
    last_tool_millis: u64,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, InteractionState::Collecting(_))
    }

    /// Routes one primary click at container coordinates `pointer`.
    pub fn handle_click(
        &mut self,
        pointer: (f32, f32),
        letterbox: Option<&Letterbox>,
        renderer: &CompositeRenderer,
        sink: &dyn CommandSink,
    ) -> ClickOutcome {
        // Any click while the menu is up only closes it.
        if matches!(self.state, InteractionState::MenuOpen { .. }) {
            self.state = InteractionState::Idle;
            return ClickOutcome::MenuDismissed;
        }

        let Some((nx, ny)) = letterbox.and_then(|lb| lb.to_native(pointer.0, pointer.1)) else {
            return ClickOutcome::OutsideVideo;
        };
        let hit = renderer.hit_test(nx, ny).cloned();
        self.handle_hit(pointer, hit, sink)
    }

    /// The state transition for a click that has already been hit-tested.
    pub fn handle_hit(
        &mut self,
        pointer: (f32, f32),
        hit: Option<OverlayPoint>,
        sink: &dyn CommandSink,
    ) -> ClickOutcome {
        match &mut self.state {
            InteractionState::MenuOpen { .. } => {
                self.state = InteractionState::Idle;
                ClickOutcome::MenuDismissed
            }
            InteractionState::Collecting(session) => {
                let Some(point) = hit else {
                    return ClickOutcome::Ignored;
                };
                if session.contains(&point.id) {
                    return ClickOutcome::Ignored;
                }
                session.collected.push(point);
                if session.collected.len() < session.kind.required_points() {
                    session.step += 1;
                    return ClickOutcome::PointCollected { step: session.step };
                }

                let kind = session.kind;
                let points: Vec<Value> = session
                    .collected
                    .iter()
                    .map(|p| p.source_id.clone())
                    .collect();
                self.state = InteractionState::Idle;
                let tool_id = self.next_tool_id();
                log::info!("creating {} tool {tool_id}", kind.as_str());
                sink.send_command(Command::new(
                    GEOMETRY_TARGET,
                    CMD_ADD_TOOL,
                    json!({
                        "id": tool_id,
                        "type": kind.as_str(),
                        "points": points,
                        "color": Color::TOOL_CREATED.to_css(),
                    }),
                ));
                ClickOutcome::ToolCreated { tool_id }
            }
            InteractionState::Idle => match hit {
                Some(point) => {
                    self.state = InteractionState::MenuOpen {
                        anchor: pointer,
                        point,
                    };
                    ClickOutcome::MenuOpened
                }
                None => ClickOutcome::EmptyClick {
                    x: pointer.0,
                    y: pointer.1,
                },
            },
        }
    }

    /// Applies a context menu action to the point the menu was opened on.
    pub fn select_action(&mut self, action: MenuAction, sink: &dyn CommandSink) {
        if !matches!(self.state, InteractionState::MenuOpen { .. }) {
            log::debug!("menu action {action:?} without an open menu");
            return;
        }
        let InteractionState::MenuOpen { point, .. } = std::mem::take(&mut self.state) else {
            return;
        };

        match action {
            MenuAction::MeasureDistance | MenuAction::MeasureAngle => {
                let kind = if action == MenuAction::MeasureDistance {
                    ToolKind::Distance
                } else {
                    ToolKind::Angle
                };
                self.state = InteractionState::Collecting(ToolCreationSession {
                    kind,
                    collected: vec![point],
                    step: 1,
                });
            }
            MenuAction::StopMeasurements => {
                sink.send_command(Command::new(
                    GEOMETRY_TARGET,
                    CMD_REMOVE_BY_POINT,
                    json!({ "point_id": point.source_id }),
                ));
            }
        }
    }

    /// Removes one tool by id and closes the menu.
    pub fn remove_tool(&mut self, tool_id: &str, sink: &dyn CommandSink) {
        self.state = InteractionState::Idle;
        sink.send_command(Command::new(
            GEOMETRY_TARGET,
            CMD_REMOVE_TOOL,
            json!({ "id": tool_id }),
        ));
    }

    /// Abandons tool creation. Returns whether anything was cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.is_collecting() {
            self.state = InteractionState::Idle;
            true
        } else {
            false
        }
    }

    pub fn dismiss_menu(&mut self) {
        if matches!(self.state, InteractionState::MenuOpen { .. }) {
            self.state = InteractionState::Idle;
        }
    }

    pub fn instruction(&self) -> Option<&'static str> {
        let InteractionState::Collecting(session) = &self.state else {
            return None;
        };
        Some(match (session.kind, session.step) {
            (ToolKind::Distance, _) => "Select the second point",
            (ToolKind::Angle, 1) => "Select the angle vertex",
            (ToolKind::Angle, _) => "Select the third point",
        })
    }

    fn next_tool_id(&mut self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        let millis = if now <= self.last_tool_millis {
            self.last_tool_millis + 1
        } else {
            now
        };
        self.last_tool_millis = millis;
        format!("tool_{millis}")
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::render::OverlayFrame;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Command>>);

    impl CommandSink for Recorder {
        fn send_command(&self, command: Command) {
            self.0.borrow_mut().push(command);
        }
    }

    fn open_menu_on(controller: &mut InteractionController, id: &str, sink: &Recorder) {
        let point = Some(OverlayPoint::new(id, 0.0, 0.0));
        let outcome = controller.handle_hit((5.0, 5.0), point, sink);
        assert_eq!(outcome, ClickOutcome::MenuOpened);
    }

    #[test]
    fn angle_creation_ignores_duplicates() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        open_menu_on(&mut controller, "p1", &sink);
        controller.select_action(MenuAction::MeasureAngle, &sink);
        assert_eq!(controller.instruction(), Some("Select the angle vertex"));

        let p = |id: &str| Some(OverlayPoint::new(id, 0.0, 0.0));
        assert_eq!(
            controller.handle_hit((0.0, 0.0), p("p2"), &sink),
            ClickOutcome::PointCollected { step: 2 }
        );
        assert_eq!(controller.instruction(), Some("Select the third point"));
        assert_eq!(
            controller.handle_hit((0.0, 0.0), p("p2"), &sink),
            ClickOutcome::Ignored
        );
        assert_eq!(
            controller.handle_hit((0.0, 0.0), None, &sink),
            ClickOutcome::Ignored
        );
        let outcome = controller.handle_hit((0.0, 0.0), p("p3"), &sink);
        assert!(matches!(outcome, ClickOutcome::ToolCreated { .. }));
        assert_eq!(controller.state(), &InteractionState::Idle);

        let sent = sink.0.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, GEOMETRY_TARGET);
        assert_eq!(sent[0].payload.cmd, CMD_ADD_TOOL);
        let args = &sent[0].payload.args;
        assert_eq!(args["type"], json!("angle"));
        assert_eq!(args["points"], json!(["p1", "p2", "p3"]));
        assert_eq!(args["color"], json!("#fbbf24"));
        assert!(args["id"].as_str().unwrap().starts_with("tool_"));
    }

    #[test]
    fn distance_needs_two_points() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        open_menu_on(&mut controller, "hip", &sink);
        controller.select_action(MenuAction::MeasureDistance, &sink);
        assert_eq!(controller.instruction(), Some("Select the second point"));
        let outcome =
            controller.handle_hit((0.0, 0.0), Some(OverlayPoint::new("knee", 0.0, 0.0)), &sink);
        assert!(matches!(outcome, ClickOutcome::ToolCreated { .. }));
        assert_eq!(sink.0.borrow()[0].payload.args["points"], json!(["hip", "knee"]));
    }

    #[test]
    fn cancel_sends_nothing() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        open_menu_on(&mut controller, "p1", &sink);
        controller.select_action(MenuAction::MeasureDistance, &sink);
        assert!(controller.cancel());
        assert_eq!(controller.state(), &InteractionState::Idle);
        assert!(!controller.cancel());
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn cancel_mid_angle_discards_collected_points() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        open_menu_on(&mut controller, "p1", &sink);
        controller.select_action(MenuAction::MeasureAngle, &sink);
        let outcome =
            controller.handle_hit((0.0, 0.0), Some(OverlayPoint::new("p2", 0.0, 0.0)), &sink);
        assert_eq!(outcome, ClickOutcome::PointCollected { step: 2 });

        assert!(controller.cancel());
        assert_eq!(controller.state(), &InteractionState::Idle);
        assert_eq!(controller.instruction(), None);
        assert!(sink.0.borrow().is_empty());

        // A click after cancelling opens a fresh menu instead of finishing the angle.
        let outcome =
            controller.handle_hit((0.0, 0.0), Some(OverlayPoint::new("p3", 0.0, 0.0)), &sink);
        assert_eq!(outcome, ClickOutcome::MenuOpened);
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn stop_measurements_removes_by_point() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        let mut point = OverlayPoint::new("5", 0.0, 0.0);
        point.source_id = json!(5);
        controller.handle_hit((1.0, 1.0), Some(point), &sink);
        controller.select_action(MenuAction::StopMeasurements, &sink);

        let sent = sink.0.borrow();
        assert_eq!(sent[0].payload.cmd, CMD_REMOVE_BY_POINT);
        assert_eq!(sent[0].payload.args, json!({"point_id": 5}));
        assert_eq!(controller.state(), &InteractionState::Idle);
    }

    #[test]
    fn menu_swallows_the_next_click() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        open_menu_on(&mut controller, "p1", &sink);
        let outcome =
            controller.handle_hit((0.0, 0.0), Some(OverlayPoint::new("p2", 0.0, 0.0)), &sink);
        assert_eq!(outcome, ClickOutcome::MenuDismissed);
        assert_eq!(controller.state(), &InteractionState::Idle);
    }

    #[test]
    fn clicks_go_through_letterbox_and_hit_test() {
        let sink = Recorder::default();
        let mut renderer = CompositeRenderer::new(1920, 1200).unwrap();
        renderer.draw(
            None,
            OverlayFrame {
                points: vec![OverlayPoint::new("A", 960.0, 600.0)],
                ..Default::default()
            },
        );
        // 1000x500 container: scale 5/12, 100px bars left and right.
        let letterbox = Letterbox::fit(1000.0, 500.0, 1920.0, 1200.0).unwrap();
        let mut controller = InteractionController::new();

        assert_eq!(
            controller.handle_click((50.0, 250.0), Some(&letterbox), &renderer, &sink),
            ClickOutcome::OutsideVideo
        );
        assert_eq!(
            controller.handle_click((120.0, 20.0), Some(&letterbox), &renderer, &sink),
            ClickOutcome::EmptyClick { x: 120.0, y: 20.0 }
        );
        assert_eq!(
            controller.handle_click((502.0, 251.0), Some(&letterbox), &renderer, &sink),
            ClickOutcome::MenuOpened
        );
        match controller.state() {
            InteractionState::MenuOpen { point, anchor } => {
                assert_eq!(point.id, "A");
                assert_eq!(*anchor, (502.0, 251.0));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn remove_tool_by_id() {
        let sink = Recorder::default();
        let mut controller = InteractionController::new();
        open_menu_on(&mut controller, "p1", &sink);
        controller.remove_tool("tool_7", &sink);
        assert_eq!(controller.state(), &InteractionState::Idle);
        assert_eq!(sink.0.borrow()[0].payload.args, json!({"id": "tool_7"}));
    }

    #[test]
    fn tool_ids_are_unique() {
        let mut controller = InteractionController::new();
        let a = controller.next_tool_id();
        let b = controller.next_tool_id();
        assert_ne!(a, b);
    }
}
