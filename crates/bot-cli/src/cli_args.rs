use bot_core::InboundEvent;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "botscript")]
#[command(about = "Markup-scripted chatbot toolkit")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Compile every bot script under a directory.
    Check(CheckArgs),
    /// Print the compiled model of one bot script as JSON.
    Compile(CompileArgs),
    /// Deliver a single inbound event against a file-backed session.
    Send(SendArgs),
    /// Interactive line-mode conversation.
    Chat(ChatArgs),
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "scripts-dir")]
    pub(crate) scripts_dir: String,
}

#[derive(Debug, Args)]
pub(crate) struct CompileArgs {
    #[arg(long = "bot")]
    pub(crate) bot: String,
}

#[derive(Debug, Args)]
pub(crate) struct SendArgs {
    #[arg(long = "bot")]
    pub(crate) bot: String,
    #[arg(long = "state-file")]
    pub(crate) state_file: String,
    #[arg(long = "session")]
    pub(crate) session: String,
    #[arg(long = "seed")]
    pub(crate) seed: Option<u32>,
    #[command(flatten)]
    pub(crate) event: EventArgs,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub(crate) struct EventArgs {
    #[arg(long = "text")]
    pub(crate) text: Option<String>,
    #[arg(long = "postback")]
    pub(crate) postback: Option<String>,
    #[arg(long = "attachment")]
    pub(crate) attachment: Option<String>,
    #[arg(long = "opt-in")]
    pub(crate) opt_in: bool,
}

impl EventArgs {
    pub(crate) fn into_event(self) -> InboundEvent {
        if let Some(payload) = self.postback {
            return InboundEvent::Postback { payload };
        }
        if let Some(url) = self.attachment {
            return InboundEvent::Message {
                text: String::new(),
                attachments: vec![url],
            };
        }
        match self.text {
            Some(text) => InboundEvent::text(text),
            None => InboundEvent::OptIn,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct ChatArgs {
    #[arg(long = "bot")]
    pub(crate) bot: String,
    #[arg(long = "state-file")]
    pub(crate) state_file: Option<String>,
    #[arg(long = "session", default_value = "local")]
    pub(crate) session: String,
    #[arg(long = "seed")]
    pub(crate) seed: Option<u32>,
}
