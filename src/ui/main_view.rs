use super::render_util::surface_to_image;
use super::{
    ActiveTheme, AnyElement, Button, ButtonVariants, ConsoleView, Context, FluentBuilder,
    InteractiveElement, IntoElement, MouseButton, ObjectFit, ParentElement, SharedString, Styled,
    StyledImage, VIDEO_MIN_HEIGHT, VideoBounds, Window, canvas, div, h_flex, img, px, v_flex,
};
use crate::telemetry::ConnectionStatus;
use std::sync::Arc;

impl ConsoleView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let version = self.session.surface_version();
        if self.image_version != Some(version) {
            if let Some(image) = surface_to_image(self.session.surface()) {
                self.replace_latest_image(image, window, cx);
            }
            self.image_version = Some(version);
        }

        let bounds_cell = self.video_bounds.clone();
        let bounds_tracker = canvas(
            move |bounds, _, _| {
                bounds_cell.set(Some(VideoBounds {
                    x: f32::from(bounds.origin.x),
                    y: f32::from(bounds.origin.y),
                    width: f32::from(bounds.size.width),
                    height: f32::from(bounds.size.height),
                }));
            },
            |_, _, _, _| {},
        )
        .absolute()
        .size_full();

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Waiting for video...")
                .into_any_element()
        };

        let mut video_shell = div()
            .relative()
            .flex_1()
            .w_full()
            .min_h(px(VIDEO_MIN_HEIGHT))
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .on_mouse_down(MouseButton::Left, cx.listener(Self::on_video_mouse_down))
            .child(frame_view)
            .child(bounds_tracker);

        if let Some(banner) = self.render_instruction(cx) {
            video_shell = video_shell.child(banner);
        }
        if let Some(menu) = self.render_context_menu(cx) {
            video_shell = video_shell.child(menu);
        }

        let mut body = v_flex()
            .flex_1()
            .gap_3()
            .p_4()
            .child(self.render_header(cx));
        if self.camera_picker_open {
            body = body.child(self.render_camera_picker(cx));
        }
        if let Some(err) = &self.camera_error {
            body = body.child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0xef444433))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444ff))
                    .child(div().text_base().child("!"))
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(err.clone()),
                    ),
            );
        }
        body = body.child(video_shell);

        div()
            .relative()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(body)
            .child(self.render_toasts(cx))
            .into_any_element()
    }

    fn render_header(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let theme = cx.theme();
        let (status_icon, status_color) = match self.session.status() {
            ConnectionStatus::Connected => ("●", theme.success),
            ConnectionStatus::Disconnected => ("○", theme.danger),
        };
        let (stream_icon, stream_text, stream_color) = if self.session.has_frame() {
            ("●", "video live", theme.success)
        } else {
            ("○", "waiting for video", theme.muted_foreground)
        };

        let pause_label = if self.session.is_paused() {
            "▶ Resume"
        } else {
            "❚❚ Pause"
        };
        let picker_label = if self.camera_picker_open {
            "◉ Close"
        } else {
            "◉ Switch"
        };

        h_flex()
            .w_full()
            .justify_between()
            .items_center()
            .gap_2()
            .child(
                h_flex()
                    .gap_3()
                    .items_center()
                    .child(
                        div()
                            .px_2()
                            .py_0p5()
                            .rounded_md()
                            .bg(gpui::rgba(0x00000033))
                            .text_xs()
                            .text_color(status_color)
                            .child(format!("{status_icon} {}", self.session.status().label())),
                    )
                    .child(
                        div()
                            .px_2()
                            .py_0p5()
                            .rounded_md()
                            .bg(gpui::rgba(0x00000033))
                            .text_xs()
                            .text_color(stream_color)
                            .child(format!("{stream_icon} {stream_text}")),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xa0aab8))
                            .child(self.session.camera_label()),
                    ),
            )
            .child(
                h_flex()
                    .gap_2()
                    .child(
                        Button::new(SharedString::from("pause-toggle"))
                            .outline()
                            .label(pause_label)
                            .on_click(cx.listener(|this, _, _, cx| {
                                let paused = !this.session.is_paused();
                                this.session.set_paused(paused);
                                cx.notify();
                            })),
                    )
                    .when(self.session.cameras().len() > 1, |this| {
                        this.child(
                            Button::new(SharedString::from("camera-picker-toggle"))
                                .outline()
                                .label(picker_label)
                                .on_click(cx.listener(|this, _, _, cx| {
                                    this.camera_picker_open = !this.camera_picker_open;
                                    cx.notify();
                                })),
                        )
                    }),
            )
            .into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<super::RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the camera is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}
