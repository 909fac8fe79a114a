pub mod network {
    pub const DEFAULT_BASE_URL: &str = "https://web.qualityautomacao.com.br";
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const AUTH_QUERY_PARAM: &str = "chave";
}

pub mod retry {
    pub const MAX_ATTEMPTS: usize = 3;
    pub const BASE_DELAY_MS: u64 = 250;
    pub const MAX_DELAY_MS: u64 = 5_000;
    pub const JITTER: f64 = 0.2;
}

pub mod pagination {
    pub const PAGE_SIZE: u64 = 100;
    pub const MAX_PAGE_SIZE: u64 = 2_000;
    pub const MIN_PAGE_SIZE: u64 = 1;
    pub const FALLBACK_CURSOR_FIELDS: &[&str] = &["codigo", "id"];
    pub const RECORD_KEYS: &[&str] = &["resultados", "registros", "data"];
}

pub mod secrets {
    pub const DEFAULT_SECRET_ID: &str = "WEBPOSTO_API_KEY";
    pub const FINGERPRINT_HEX_LEN: usize = 8;
}

pub mod limits {
    pub const LOG_BODY_BYTES: usize = 500;
    pub const MAX_SUGGESTIONS: usize = 3;
}

pub mod protocol {
    pub const PROTOCOL_VERSION: &str = "2025-06-18";
    pub const SERVER_NAME: &str = "webposto-mcp";
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}
