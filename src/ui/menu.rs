use super::{
    AnyElement, Button, ButtonVariants, ConsoleView, Context, InteractiveElement, IntoElement,
    MENU_WIDTH, MouseButton, ParentElement, Severity, SharedString, Styled, div, h_flex, px,
    v_flex,
};
use crate::interaction::MenuAction;

impl ConsoleView {
    pub(super) fn render_context_menu(&mut self, cx: &mut Context<'_, Self>) -> Option<AnyElement> {
        let menu = self.session.menu()?;

        // Keep the menu inside the video element.
        let (max_x, max_y) = self
            .video_bounds
            .get()
            .map(|b| (b.width - MENU_WIDTH, b.height - 200.0))
            .unwrap_or((f32::MAX, f32::MAX));
        let left = menu.anchor.0.min(max_x).max(0.0);
        let top = menu.anchor.1.min(max_y).max(0.0);

        let mut panel = v_flex()
            .absolute()
            .left(px(left))
            .top(px(top))
            .w(px(MENU_WIDTH))
            .gap_1()
            .p_2()
            .rounded_lg()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg()
            // Clicks inside the menu must not reach the video underneath.
            .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
            .child(
                div()
                    .px_2()
                    .pb_1()
                    .text_xs()
                    .text_color(gpui::rgb(0xa0aab8))
                    .child(format!("Point {}", menu.point.label)),
            )
            .child(menu_button("menu-distance", "Measure distance", cx, |this, _| {
                this.session.select_action(MenuAction::MeasureDistance);
            }))
            .child(menu_button("menu-angle", "Measure angle", cx, |this, _| {
                this.session.select_action(MenuAction::MeasureAngle);
            }))
            .child(menu_button("menu-stop", "Stop measurements", cx, |this, _| {
                this.session.select_action(MenuAction::StopMeasurements);
            }));

        for tool in menu.tools {
            let label = format!(
                "Remove {} {} ({:.1} {})",
                tool.kind.as_str(),
                tool.id,
                tool.current_value,
                tool.unit
            );
            let tool_id = tool.id.clone();
            panel = panel.child(
                Button::new(SharedString::from(format!("menu-remove-{}", tool.id)))
                    .ghost()
                    .w_full()
                    .label(label)
                    .on_click(cx.listener(move |this, _, _, cx| {
                        this.session.remove_tool(&tool_id);
                        cx.notify();
                    })),
            );
        }

        Some(panel.into_any_element())
    }

    pub(super) fn render_instruction(&mut self, cx: &mut Context<'_, Self>) -> Option<AnyElement> {
        let text = self.session.instruction()?;
        Some(
            h_flex()
                .absolute()
                .top(px(12.0))
                .left(px(12.0))
                .gap_3()
                .items_center()
                .px_3()
                .py_2()
                .rounded_lg()
                .bg(gpui::rgba(0x000000b3))
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .child(
                    div()
                        .text_sm()
                        .text_color(gpui::rgb(0xfbbf24))
                        .child(text),
                )
                .child(
                    Button::new(SharedString::from("cancel-tool"))
                        .outline()
                        .label("Cancel")
                        .on_click(cx.listener(|this, _, _, cx| {
                            this.session.cancel_tool();
                            cx.notify();
                        })),
                )
                .into_any_element(),
        )
    }

    pub(super) fn render_toasts(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let mut column = v_flex()
            .absolute()
            .bottom(px(16.0))
            .right(px(16.0))
            .w(px(320.0))
            .gap_2();

        for toast in self.session.toasts().iter() {
            let notification = &toast.notification;
            let accent = match notification.severity {
                Severity::Info => gpui::rgb(0x3b82f6),
                Severity::Success => gpui::rgb(0x22c55e),
                Severity::Warning => gpui::rgb(0xf59e0b),
                Severity::Error => gpui::rgb(0xef4444),
            };
            let id = notification.id.clone();
            let mut body = v_flex().flex_1().gap_0p5();
            if !notification.title.is_empty() {
                body = body.child(
                    div()
                        .text_sm()
                        .text_color(gpui::rgb(0xe2e8f0))
                        .child(notification.title.clone()),
                );
            }
            body = body.child(
                div()
                    .text_xs()
                    .text_color(gpui::rgb(0xcbd5e1))
                    .child(notification.message.clone()),
            );

            column = column.child(
                h_flex()
                    .gap_2()
                    .items_start()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0x0f1419f0))
                    .border_1()
                    .border_color(accent)
                    .child(
                        div()
                            .text_sm()
                            .text_color(accent)
                            .child(notification.severity.icon()),
                    )
                    .child(body)
                    .child(
                        Button::new(SharedString::from(format!("toast-{id}")))
                            .ghost()
                            .label("×")
                            .on_click(cx.listener(move |this, _, _, cx| {
                                this.session.dismiss_toast(&id);
                                cx.notify();
                            })),
                    ),
            );
        }

        column.into_any_element()
    }
}

fn menu_button(
    id: &'static str,
    label: &'static str,
    cx: &mut Context<'_, ConsoleView>,
    action: impl Fn(&mut ConsoleView, &mut Context<'_, ConsoleView>) + 'static,
) -> Button {
    Button::new(SharedString::from(id))
        .ghost()
        .w_full()
        .label(label)
        .on_click(cx.listener(move |this, _, _, cx| {
            action(this, cx);
            cx.notify();
        }))
}
