#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ping,
    Run,
    Stop,
    Status,
    Validate,
    ExtractPlaceholders,
    MergeLocales,
    Unknown,
}

impl From<&str> for Command {
    fn from(s: &str) -> Self {
        match s {
            "ping" => Command::Ping,
            "run" | "translate" => Command::Run,
            "stop" => Command::Stop,
            "status" | "progress" => Command::Status,
            "validate" => Command::Validate,
            "extract_placeholders" => Command::ExtractPlaceholders,
            "merge_locales" => Command::MergeLocales,
            _ => Command::Unknown,
        }
    }
}
