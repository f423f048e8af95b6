/// Application name, used in email subjects and bodies
pub const APP_NAME: &str = "NHAPP";

/// Bio assigned to every freshly created user
pub const DEFAULT_STATUS_TEXT: &str = "Hey there! I'm using NHAPP";

/// Display name given to a private chat when the other participant is unknown
pub const FALLBACK_CHAT_NAME: &str = "Chat";

/// Lifetime of a status post in hours
pub const STATUS_TTL_HOURS: i64 = 24;

/// Typing rows older than this are ignored at read time
pub const TYPING_WINDOW_MS: i64 = 5_000;

/// Lifetime of a one-time passcode in minutes
pub const OTP_TTL_MINUTES: i64 = 10;

/// Lifetime of an invite in days
pub const INVITE_TTL_DAYS: i64 = 7;

/// Length of a generated invite code
pub const INVITE_CODE_LEN: usize = 13;

/// Number of messages returned by a single history fetch
pub const MESSAGE_PAGE_SIZE: u32 = 100;

/// Number of starred messages returned per user
pub const STARRED_PAGE_SIZE: u32 = 100;

/// Maximum number of users returned by a directory search
pub const USER_SEARCH_LIMIT: usize = 10;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Maximum uploaded blob size in bytes (50 MiB)
pub const MAX_BLOB_SIZE: usize = 50 * 1024 * 1024;
