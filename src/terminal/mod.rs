//! Raw-mode terminal front-end: a blocking key reader feeding the app loop
//! and a renderer redrawing on every view change.

mod keymap;
mod render;

pub use keymap::map_key;
pub use render::render;

use crate::app::AppInput;
use crate::error::Result;
use crate::events::UserAction;
use crate::router::ViewState;
use crossterm::cursor::{Hide, MoveTo, MoveToNextLine, Show};
use crossterm::event::{self, Event};
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct TerminalFrontend {
    cancellation_token: CancellationToken,
}

impl TerminalFrontend {
    pub fn new() -> Self {
        Self {
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Take over the terminal and start the key reader and renderer
    pub fn start(
        &self,
        views: watch::Receiver<ViewState>,
        inputs: mpsc::UnboundedSender<AppInput>,
    ) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, Hide)?;
        info!("Terminal front-end started");

        self.spawn_key_reader(views.clone(), inputs);
        self.spawn_renderer(views);
        Ok(())
    }

    fn spawn_key_reader(
        &self,
        views: watch::Receiver<ViewState>,
        inputs: mpsc::UnboundedSender<AppInput>,
    ) {
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Key reader stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key = match event::read() {
                            Ok(Event::Key(key)) => key,
                            Ok(_) => continue,
                            Err(e) => {
                                warn!("Error reading terminal event: {}", e);
                                continue;
                            }
                        };

                        let view = views.borrow().view.clone();
                        let Some(input) = map_key(&view, key) else {
                            debug!("Unbound key {:?} on {} view", key.code, view.name());
                            continue;
                        };

                        let quitting = input == AppInput::Action(UserAction::Quit);
                        if inputs.send(input).is_err() || quitting {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            debug!("Key reader task exited");
        });
    }

    fn spawn_renderer(&self, mut views: watch::Receiver<ViewState>) {
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                let lines = render(&views.borrow_and_update());
                if let Err(e) = draw(&mut io::stdout(), &lines) {
                    error!("Failed to draw screen: {}", e);
                }

                tokio::select! {
                    changed = views.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = cancellation_token.cancelled() => break,
                }
            }

            debug!("Renderer task exited");
        });
    }

    /// Stop both tasks and hand the terminal back
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping terminal front-end");
        self.cancellation_token.cancel();

        // Let the key reader notice the cancellation before leaving raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        execute!(io::stdout(), Show, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        Ok(())
    }
}

impl Default for TerminalFrontend {
    fn default() -> Self {
        Self::new()
    }
}

fn draw<W: Write>(out: &mut W, lines: &[String]) -> io::Result<()> {
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    for line in lines {
        queue!(out, Print(line), MoveToNextLine(1))?;
    }
    out.flush()
}
