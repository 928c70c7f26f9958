//! Shared protocol constants for the ftserver control/data transport

// Handshake literals (exact matches required on the wire)
pub const CONTROL_GREETING: &str = "FTSERVER CONNECTION ESTABLISHED";
pub const DATA_INIT: &str = "FTSERVER DATA CONNECTION INITIALIZATION";
pub const DATA_ACK: &str = "FTSERVER DATA CONNECTION ACCEPTED";

// Terminal status prefix: "SUCCESS! <total> ..."
pub const SUCCESS_MARKER: &str = "SUCCESS!";

// First control frame: "DATA_PORT: <port>"
pub const DATA_PORT_PREFIX: &str = "DATA_PORT: ";

// Frame header: "<decimal length>@"
pub const LENGTH_TERMINATOR: u8 = b'@';

// Longest accepted decimal length field (u64::MAX has 20 digits)
pub const MAX_LENGTH_DIGITS: usize = 20;

// Maximum frame payload size (64MB) - prevents memory exhaustion from a bogus header
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

// Upper bound on name_N.ext candidates tried before giving up
pub const MAX_COPY_INDEX: u32 = 100_000;

// Default command tokens
pub mod command {
    pub const GET_FILE: &str = "-g";
    pub const LIST_FILES: &str = "-l";
    pub const LIST_TXT_FILES: &str = "-ltxt";
}

/// Build the data port announcement sent as the first control frame
pub fn data_port_announcement(prefix: &str, port: u16) -> String {
    format!("{}{}", prefix, port)
}

/// Build the request frame body: the command token, then " <filename>" when present
pub fn request_line(token: &str, filename: Option<&str>) -> String {
    match filename {
        Some(name) => format!("{} {}", token, name),
        None => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcement_format() {
        assert_eq!(data_port_announcement(DATA_PORT_PREFIX, 30020), "DATA_PORT: 30020");
    }

    #[test]
    fn request_line_with_and_without_filename() {
        assert_eq!(request_line(command::GET_FILE, Some("report.txt")), "-g report.txt");
        assert_eq!(request_line(command::LIST_FILES, None), "-l");
        assert_eq!(request_line(command::LIST_TXT_FILES, None), "-ltxt");
    }
}
