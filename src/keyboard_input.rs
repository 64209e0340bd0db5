use crate::capture::ScanScript;
use crate::error::Result;
use crate::events::{ControllerMessage, OperatorCommand, TouchSignal};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How many frames a scripted payload stays in view of the synthetic camera
const SCRIPTED_PAYLOAD_FRAMES: u32 = 5;

/// What a key press does
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Operator(OperatorCommand),
    /// Toggle a sustained touch on the screen
    ToggleTouch,
    /// Hold scripted payload N in front of the synthetic camera
    ShowPayload(usize),
    Quit,
}

/// Key bindings for the operator console
pub fn map_key(code: KeyCode) -> Option<KeyAction> {
    let action = match code {
        KeyCode::Char('s') => KeyAction::Operator(OperatorCommand::StartScanning),
        KeyCode::Char('l') => KeyAction::Operator(OperatorCommand::StartLabelScan),
        KeyCode::Char(' ') => KeyAction::Operator(OperatorCommand::Capture),
        KeyCode::Char('r') => KeyAction::Operator(OperatorCommand::Retake),
        KeyCode::Enter => KeyAction::Operator(OperatorCommand::Submit),
        KeyCode::Char('c') => KeyAction::Operator(OperatorCommand::Cancel),
        KeyCode::Char('t') => KeyAction::ToggleTouch,
        KeyCode::Char(c @ '1'..='9') => KeyAction::ShowPayload(c as usize - '1' as usize),
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        _ => return None,
    };
    Some(action)
}

/// Raw-mode keyboard console that turns key presses into operator commands
pub struct KeyboardInputHandler {
    messages: mpsc::Sender<ControllerMessage>,
    script: Option<(ScanScript, Vec<String>)>,
    quit: CancellationToken,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    /// `quit` is cancelled when the operator presses q or Esc
    pub fn new(messages: mpsc::Sender<ControllerMessage>, quit: CancellationToken) -> Self {
        Self {
            messages,
            script: None,
            quit,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Bind the digit keys to scripted payloads for the synthetic camera
    pub fn with_scripted_payloads(mut self, script: ScanScript, payloads: Vec<String>) -> Self {
        self.script = Some((script, payloads));
        self
    }

    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard console: s=scan l=label space=capture r=retake enter=submit c=cancel t=touch q=quit");

        let mut console = Console {
            messages: self.messages.clone(),
            script: self.script.clone(),
            touch_held: false,
        };
        let quit = self.quit.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard console active");

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        match map_key(key_event.code) {
                            Some(KeyAction::Quit) => {
                                info!("Quit key pressed - requesting shutdown");
                                quit.cancel();
                                break;
                            }
                            Some(action) => {
                                if !console.apply(action) {
                                    break;
                                }
                            }
                            None => debug!("Unbound key: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard console exited");
        });

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard console");
        self.cancellation_token.cancel();

        // Let the blocking task notice and restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

struct Console {
    messages: mpsc::Sender<ControllerMessage>,
    script: Option<(ScanScript, Vec<String>)>,
    touch_held: bool,
}

impl Console {
    /// Returns false once the controller is gone
    fn apply(&mut self, action: KeyAction) -> bool {
        let message = match action {
            KeyAction::Operator(command) => ControllerMessage::Operator(command),
            KeyAction::ToggleTouch => {
                self.touch_held = !self.touch_held;
                ControllerMessage::Touch(if self.touch_held {
                    TouchSignal::Pressed
                } else {
                    TouchSignal::Released
                })
            }
            KeyAction::ShowPayload(slot) => {
                match &self.script {
                    Some((script, payloads)) => match payloads.get(slot) {
                        Some(payload) => {
                            info!("Showing scripted payload {}", slot + 1);
                            script.show(payload.clone(), SCRIPTED_PAYLOAD_FRAMES);
                        }
                        None => debug!("No scripted payload in slot {}", slot + 1),
                    },
                    None => debug!("Scripted payloads need the synthetic camera"),
                }
                return true;
            }
            KeyAction::Quit => return false,
        };

        if self.messages.blocking_send(message).is_err() {
            warn!("Controller queue closed, stopping keyboard console");
            return false;
        }
        true
    }
}
