//! The fixed status-code table: reason phrases and short error-page
//! messages for every status this server can emit.

/// One entry: numeric code, reason phrase, and a short message used to fill
/// in the canned error page body.
pub struct StatusEntry {
    pub code: u16,
    pub reason: &'static str,
    pub message: &'static str,
}

const TABLE: &[StatusEntry] = &[
    StatusEntry { code: 200, reason: "OK", message: "" },
    StatusEntry { code: 400, reason: "Bad Request", message: "Received request was malformed." },
    StatusEntry { code: 403, reason: "Forbidden", message: "File access forbidden." },
    StatusEntry { code: 404, reason: "Not Found", message: "Requested file not found." },
    StatusEntry { code: 405, reason: "Method Not Allowed", message: "Request contained unknown method." },
    StatusEntry { code: 408, reason: "Request Time-out", message: "No enough data received in a reasonable timeframe." },
    StatusEntry { code: 412, reason: "Precondition Failed", message: "A precondition on the request failed." },
    StatusEntry { code: 414, reason: "URI Too Long", message: "The request path was too long." },
    StatusEntry { code: 417, reason: "Expectation Failed", message: "Expectations aren't supported." },
    StatusEntry { code: 500, reason: "Internal Server Error", message: "Unknown server error." },
    StatusEntry { code: 501, reason: "Not Implemented", message: "Sorry, the server doesn't know how to handle the request." },
    StatusEntry { code: 502, reason: "Bad Gateway", message: "The CGI program produced an error." },
    StatusEntry { code: 505, reason: "HTTP Version Not Supported", message: "Only HTTP/1.1 is supported." },
];

/// Looks up a status code's table entry, falling back to 501's entry for an
/// unknown code.
pub fn lookup(code: u16) -> &'static StatusEntry {
    TABLE
        .iter()
        .find(|e| e.code == code)
        .unwrap_or_else(|| TABLE.iter().find(|e| e.code == 501).unwrap())
}
