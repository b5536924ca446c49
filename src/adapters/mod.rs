// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod local_fetch;
pub mod probe_ffprobe;
pub mod toml_config;
pub mod tool_command;
pub mod transport_console;
pub mod transport_directory;
pub mod transport_retry;

// Re-export adapters
pub use exec_ffmpeg::FFmpegAdapter;
pub use local_fetch::LocalFetch;
pub use probe_ffprobe::FFprobeAdapter;
pub use toml_config::AppConfig;
pub use tool_command::ToolCommand;
pub use transport_console::ConsoleTransport;
pub use transport_directory::DirectoryTransport;
pub use transport_retry::RetryingTransport;
