use std::{cell::Cell, rc::Rc, sync::Arc, time::Instant};

use gpui::{
    AnyElement, App, AppContext, Context, InteractiveElement, IntoElement, MouseButton,
    MouseDownEvent, ObjectFit, ParentElement, Render, RenderImage, SharedString, Styled,
    StyledImage, TitlebarOptions, Window, WindowOptions, canvas, div, img, px,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{
    ActiveTheme, Root, Selectable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::console::ConsoleSession;
use crate::types::Severity;

mod camera_view;
mod main_view;
mod menu;
mod render_util;

const VIDEO_MIN_HEIGHT: f32 = 240.0;
const MENU_WIDTH: f32 = 220.0;

pub fn launch_ui(app: &mut App, session: ConsoleSession) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Vision Console".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| ConsoleView::new(session));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

/// Video element bounds in window coordinates, captured during prepaint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct VideoBounds {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

struct ConsoleView {
    session: ConsoleSession,
    latest_image: Option<Arc<RenderImage>>,
    image_version: Option<u64>,
    video_bounds: Rc<Cell<Option<VideoBounds>>>,
    camera_picker_open: bool,
    camera_error: Option<String>,
}

impl ConsoleView {
    fn new(mut session: ConsoleSession) -> Self {
        let camera_error = session.start().err().map(|err| {
            log::error!("failed to start camera stream: {err:#}");
            format!("{err:#}")
        });
        Self {
            session,
            latest_image: None,
            image_version: None,
            video_bounds: Rc::new(Cell::new(None)),
            camera_picker_open: false,
            camera_error,
        }
    }

    fn on_video_mouse_down(
        &mut self,
        event: &MouseDownEvent,
        _: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        let Some(bounds) = self.video_bounds.get() else {
            return;
        };
        let pointer = (
            f32::from(event.position.x) - bounds.x,
            f32::from(event.position.y) - bounds.y,
        );
        self.session.click(pointer, (bounds.width, bounds.height));
        cx.notify();
    }
}

impl Render for ConsoleView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.session.tick(Instant::now());
        self.render_main(window, cx)
    }
}
