//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Conversational news agent backed by a chat-completion service
///
/// Works with Google Gemini and OpenAI-compatible endpoints (OpenAI,
/// OpenRouter, Ollama, local models).
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the default search path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single task and print its response
    Ask {
        /// The message to send
        message: String,

        /// Conversation to continue (generated when omitted)
        #[arg(short, long)]
        context: Option<String>,

        /// Task identifier (generated when omitted)
        #[arg(short, long)]
        task: Option<String>,
    },

    /// Interactive conversation on stdin; Ctrl-C cancels the running request
    Chat {
        /// Conversation identifier (generated when omitted)
        #[arg(short, long)]
        context: Option<String>,
    },

    /// Show the effective configuration
    Config {
        /// Write a default config file to ~/.config/herald/herald.toml
        #[arg(long)]
        init: bool,

        /// Overwrite an existing file with --init
        #[arg(long, requires = "init")]
        force: bool,
    },
}

/// What a Ctrl-C press does while a request is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// Cancel the running request and wait for its Cancelled event
    Cancel,
    /// Stop waiting and leave
    Quit,
}

/// Ctrl-C presses seen during one request: the first cancels, the next quits
#[derive(Debug, Default)]
pub struct InterruptState {
    pressed: bool,
}

impl InterruptState {
    pub fn press(&mut self) -> Interrupt {
        if self.pressed {
            Interrupt::Quit
        } else {
            self.pressed = true;
            Interrupt::Cancel
        }
    }
}
