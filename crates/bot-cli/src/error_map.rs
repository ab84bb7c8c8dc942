use bot_core::BotScriptError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> BotScriptError {
    BotScriptError::new(code, error.to_string())
}

pub(crate) fn emit_error(error: BotScriptError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!("ERROR_MSG_JSON:{}", json_string(&error.message));
    1
}

pub(crate) fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn map_cli_io(error: std::io::Error) -> BotScriptError {
    map_error("CLI_IO", error)
}

pub(crate) fn map_cli_runtime(error: std::io::Error) -> BotScriptError {
    map_error("CLI_RUNTIME", error)
}

pub(crate) fn map_cli_source_path(error: std::io::Error) -> BotScriptError {
    map_error("CLI_SOURCE_PATH", error)
}

pub(crate) fn map_cli_json(error: serde_json::Error) -> BotScriptError {
    map_error("CLI_JSON", error)
}
