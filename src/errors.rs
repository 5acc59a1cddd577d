use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkkeeperError {
    InvalidUrl(String),
    NotFound(String),
    CodeExhausted(String),
    Persistence(String),
    Serialization(String),
    Config(String),
}

impl LinkkeeperError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkkeeperError::InvalidUrl(_) => "E001",
            LinkkeeperError::NotFound(_) => "E002",
            LinkkeeperError::CodeExhausted(_) => "E003",
            LinkkeeperError::Persistence(_) => "E004",
            LinkkeeperError::Serialization(_) => "E005",
            LinkkeeperError::Config(_) => "E006",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkkeeperError::InvalidUrl(_) => "Invalid URL",
            LinkkeeperError::NotFound(_) => "Short Code Not Found",
            LinkkeeperError::CodeExhausted(_) => "Short Code Space Exhausted",
            LinkkeeperError::Persistence(_) => "Persistence Error",
            LinkkeeperError::Serialization(_) => "Serialization Error",
            LinkkeeperError::Config(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkkeeperError::InvalidUrl(msg)
            | LinkkeeperError::NotFound(msg)
            | LinkkeeperError::CodeExhausted(msg)
            | LinkkeeperError::Persistence(msg)
            | LinkkeeperError::Serialization(msg)
            | LinkkeeperError::Config(msg) => msg,
        }
    }

    /// Caller-recoverable conditions (bad input, unknown code).
    ///
    /// Everything else is operational and gets logged by whoever sees it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LinkkeeperError::InvalidUrl(_) | LinkkeeperError::NotFound(_)
        )
    }

    /// 格式化为彩色输出（用于 serve 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出（用于 CLI 模式）
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkkeeperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkkeeperError {}

// 便捷的构造函数
impl LinkkeeperError {
    pub fn invalid_url<T: Into<String>>(msg: T) -> Self {
        LinkkeeperError::InvalidUrl(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkkeeperError::NotFound(msg.into())
    }

    pub fn code_exhausted<T: Into<String>>(msg: T) -> Self {
        LinkkeeperError::CodeExhausted(msg.into())
    }

    pub fn persistence<T: Into<String>>(msg: T) -> Self {
        LinkkeeperError::Persistence(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        LinkkeeperError::Serialization(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        LinkkeeperError::Config(msg.into())
    }
}

impl From<std::io::Error> for LinkkeeperError {
    fn from(err: std::io::Error) -> Self {
        LinkkeeperError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LinkkeeperError {
    fn from(err: serde_json::Error) -> Self {
        LinkkeeperError::Serialization(err.to_string())
    }
}

impl From<crate::utils::url_validator::UrlValidationError> for LinkkeeperError {
    fn from(err: crate::utils::url_validator::UrlValidationError) -> Self {
        LinkkeeperError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LinkkeeperError>;
