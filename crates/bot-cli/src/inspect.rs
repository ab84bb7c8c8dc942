use std::io::{self, Write};

use bot_api::compile_script_from_file;
use bot_core::BotScriptError;
use tracing::{debug, info};

use crate::{
    find_bot_scripts, json_string, map_cli_io, map_cli_json, resolve_scripts_dir, CheckArgs,
    CompileArgs,
};

pub(crate) fn run_check(args: CheckArgs) -> Result<i32, BotScriptError> {
    run_check_with_io(args, &mut io::stdout())
}

/// One `OK:` or `ERROR:` line per script; exit code 1 when any failed.
pub(crate) fn run_check_with_io(
    args: CheckArgs,
    writer: &mut dyn Write,
) -> Result<i32, BotScriptError> {
    let root = resolve_scripts_dir(&args.scripts_dir)?;
    let scripts = find_bot_scripts(&root)?;

    let mut failed = 0usize;
    for path in &scripts {
        match compile_script_from_file(path) {
            Ok(script) => {
                debug!(path = %path.display(), script = %script.id, "script compiled");
                writeln!(writer, "OK:{}", path.display()).map_err(map_cli_io)?;
            }
            Err(error) => {
                failed += 1;
                writeln!(
                    writer,
                    "ERROR:{}|{}|{}",
                    path.display(),
                    error.code,
                    json_string(&error.message)
                )
                .map_err(map_cli_io)?;
            }
        }
    }

    info!(checked = scripts.len(), failed, "check finished");
    writeln!(writer, "CHECKED:{}", scripts.len()).map_err(map_cli_io)?;
    Ok(if failed == 0 { 0 } else { 1 })
}

pub(crate) fn run_compile(args: CompileArgs) -> Result<i32, BotScriptError> {
    run_compile_with_io(args, &mut io::stdout())
}

pub(crate) fn run_compile_with_io(
    args: CompileArgs,
    writer: &mut dyn Write,
) -> Result<i32, BotScriptError> {
    let script = compile_script_from_file(&args.bot)?;
    let payload = serde_json::to_string(script.as_ref()).map_err(map_cli_json)?;
    writeln!(writer, "RESULT:OK").map_err(map_cli_io)?;
    writeln!(writer, "SCRIPT_JSON:{}", payload).map_err(map_cli_io)?;
    Ok(0)
}
