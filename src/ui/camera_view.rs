use super::{
    AnyElement, Button, ButtonVariants, ConsoleView, Context, FluentBuilder, IntoElement,
    ParentElement, Selectable, SharedString, Styled, div, h_flex, v_flex,
};
use crate::types::CameraId;

impl ConsoleView {
    pub(super) fn render_camera_picker(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let mut picker = v_flex()
            .gap_2()
            .p_4()
            .rounded_xl()
            .bg(gpui::rgba(0x0f1419f5))
            .border_1()
            .border_color(gpui::rgba(0x2d3748ff))
            .shadow_lg();

        let title_row = h_flex()
            .justify_between()
            .items_center()
            .w_full()
            .mb_2()
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(div().text_base().text_color(gpui::rgb(0xa5b4fc)).child("◉"))
                    .child(
                        div()
                            .text_sm()
                            .text_color(gpui::rgb(0xe2e8f0))
                            .child("Select camera"),
                    ),
            )
            .child(
                Button::new(SharedString::from("camera-picker-close"))
                    .label("×")
                    .ghost()
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.camera_picker_open = false;
                        cx.notify();
                    })),
            );
        picker = picker.child(title_row);

        let current = self.session.camera_id();
        let mut row = h_flex().gap_2().flex_wrap();
        for camera in self.session.cameras() {
            let camera_id = camera.id;
            let is_selected = camera_id == current;
            row = row.child(
                Button::new(SharedString::from(format!("camera-{camera_id}")))
                    .outline()
                    .selected(is_selected)
                    .label(camera.label())
                    .on_click(cx.listener(move |this, _, _, cx| {
                        this.switch_camera(camera_id);
                        cx.notify();
                    })),
            );
        }
        picker = picker.child(row);

        picker
            .when(self.camera_error.is_some(), |this| {
                this.child(
                    div()
                        .text_xs()
                        .text_color(gpui::rgb(0xfca5a5))
                        .child("The last stream failed to start; pick a camera to retry."),
                )
            })
            .into_any_element()
    }

    fn switch_camera(&mut self, camera_id: CameraId) {
        match self.session.switch_camera(camera_id) {
            Ok(()) => {
                self.camera_error = None;
                self.camera_picker_open = false;
            }
            Err(err) => {
                log::error!("failed to switch to camera {camera_id}: {err:#}");
                self.camera_error = Some(format!("{err:#}"));
            }
        }
    }
}
