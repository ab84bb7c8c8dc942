use std::ffi::OsString;

use bot_core::BotScriptError;
use clap::Parser;

mod cli_args;
mod error_map;
mod inspect;
mod line_chat;
mod session_ops;
mod source_loader;

pub(crate) use cli_args::{ChatArgs, CheckArgs, Cli, CompileArgs, Mode, SendArgs};
pub(crate) use error_map::{
    emit_error, json_string, map_cli_io, map_cli_json, map_cli_runtime, map_cli_source_path,
};
#[cfg(test)]
pub(crate) use inspect::{run_check_with_io, run_compile_with_io};
#[cfg(test)]
pub(crate) use line_chat::{parse_line, render_messages, run_chat_with_io, LineCommand};
pub(crate) use session_ops::{create_session_engine, SessionEngine};
#[cfg(test)]
pub(crate) use session_ops::write_messages;
pub(crate) use source_loader::{find_bot_scripts, resolve_scripts_dir};
#[cfg(test)]
pub(crate) use source_loader::is_bot_script;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => return emit_error(map_cli_runtime(error)),
    };
    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

async fn run(cli: Cli) -> Result<i32, BotScriptError> {
    match cli.command {
        Mode::Check(args) => inspect::run_check(args),
        Mode::Compile(args) => inspect::run_compile(args),
        Mode::Send(args) => session_ops::run_send(args).await,
        Mode::Chat(args) => line_chat::run_chat(args).await,
    }
}
