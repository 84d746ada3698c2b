//! prism demo binary.
//!
//! Opens a window and runs the GPU frame lifecycle against it: swapchain
//! clears per frame, rebuilds on resize, clean drain on exit.

mod renderer;

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use prism_core::RendererConfig;
use prism_platform::Window;
use renderer::Renderer;

struct App {
    config: RendererConfig,
    window: Option<Window>,
    renderer: Option<Renderer>,
}

impl App {
    fn new(config: RendererConfig) -> Self {
        Self {
            config,
            window: None,
            renderer: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match Window::new(event_loop, &self.config) {
            Ok(window) => match Renderer::new(&window, self.config.clone()) {
                Ok(renderer) => {
                    info!("Initialization complete, entering frame loop");
                    self.renderer = Some(renderer);
                    self.window = Some(window);
                }
                Err(e) => {
                    error!("Failed to create renderer: {:?}", e);
                    event_loop.exit();
                }
            },
            Err(e) => {
                error!("Failed to create window: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut renderer) = self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window)
                    && let Err(e) = renderer.render_frame(window)
                {
                    // Unrecoverable: transient surface states were already
                    // handled inside the frame.
                    error!("Frame failed: {:?}", e);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    prism_core::init_logging();
    info!("Starting prism");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(RendererConfig::default());
    event_loop.run_app(&mut app)?;

    Ok(())
}
