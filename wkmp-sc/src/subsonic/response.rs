//! Response envelope
//!
//! Every response, success or failure, is built here and nowhere else. The
//! envelope is first reduced to one logical `serde_json::Value`; the three wire
//! formats are different framings of that value:
//!
//! - markup (default): `<subsonic-response xmlns=... status=... ...>`
//! - `f=json`: `{"subsonic-response": {...}}`
//! - `f=jsonp&callback=cb`: `cb({"subsonic-response": {...}});`
//!
//! The HTTP status is decided from the envelope outcome alone
//! (see [`http_status_for_code`](super::error_code::http_status_for_code)).

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::{ApiError, Result};
use crate::subsonic::payload::*;
use crate::subsonic::{xml, ErrorCode};

/// Protocol version implemented by this server
pub const API_VERSION: &str = "1.16.1";

/// XML namespace of the protocol
pub const XML_NAMESPACE: &str = "http://subsonic.org/restapi";

/// Name of the document element / top-level JSON key
pub const ROOT_ELEMENT: &str = "subsonic-response";

/// Product name reported by the probe endpoint
pub const SERVER_TYPE: &str = "wkmp";

// ========================================
// Wire Format
// ========================================

/// Output format requested through `f` (and `callback`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Xml,
    Json,
    /// JSON wrapped in a call to the named function
    Jsonp(String),
}

impl Format {
    /// Resolve the format from the raw `f` and `callback` values
    ///
    /// Unknown `f` values fall back to markup. `jsonp` without a usable callback
    /// name renders as plain JSON.
    pub fn from_params(f: Option<&str>, callback: Option<&str>) -> Self {
        match f {
            Some("json") => Format::Json,
            Some("jsonp") => match callback.filter(|cb| !cb.is_empty()) {
                Some(cb) if is_valid_callback(cb) => Format::Jsonp(cb.to_string()),
                Some(cb) => {
                    tracing::warn!("Ignoring unusable JSONP callback name: {:?}", cb);
                    Format::Json
                }
                None => Format::Json,
            },
            _ => Format::Xml,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Xml => "application/xml; charset=utf-8",
            Format::Json => "application/json; charset=utf-8",
            Format::Jsonp(_) => "application/javascript; charset=utf-8",
        }
    }
}

/// Callback names are limited to identifier characters so the wrapper cannot
/// smuggle script into the response
fn is_valid_callback(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

// ========================================
// Payloads
// ========================================

/// Every success body this server can produce
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Bare success (ping)
    Empty,
    License(License),
    OpenSubsonicExtensions(Vec<OpenSubsonicExtension>),
    TokenInfo(TokenInfo),
    User(User),
    MusicFolders(MusicFolders),
    Artists(Artists),
    Artist(ArtistWithAlbums),
    Album(AlbumWithSongs),
    Song(Child),
    Playlists(Playlists),
    Playlist(PlaylistWithSongs),
}

/// Discriminant of [`Payload`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Empty,
    License,
    OpenSubsonicExtensions,
    TokenInfo,
    User,
    MusicFolders,
    Artists,
    Artist,
    Album,
    Song,
    Playlists,
    Playlist,
}

impl PayloadKind {
    pub const ALL: [PayloadKind; 12] = [
        PayloadKind::Empty,
        PayloadKind::License,
        PayloadKind::OpenSubsonicExtensions,
        PayloadKind::TokenInfo,
        PayloadKind::User,
        PayloadKind::MusicFolders,
        PayloadKind::Artists,
        PayloadKind::Artist,
        PayloadKind::Album,
        PayloadKind::Song,
        PayloadKind::Playlists,
        PayloadKind::Playlist,
    ];

    /// Envelope key the payload is nested under; `None` for a bare success
    pub fn key(self) -> Option<&'static str> {
        match self {
            PayloadKind::Empty => None,
            PayloadKind::License => Some("license"),
            PayloadKind::OpenSubsonicExtensions => Some("openSubsonicExtensions"),
            PayloadKind::TokenInfo => Some("tokenInfo"),
            PayloadKind::User => Some("user"),
            PayloadKind::MusicFolders => Some("musicFolders"),
            PayloadKind::Artists => Some("artists"),
            PayloadKind::Artist => Some("artist"),
            PayloadKind::Album => Some("album"),
            PayloadKind::Song => Some("song"),
            PayloadKind::Playlists => Some("playlists"),
            PayloadKind::Playlist => Some("playlist"),
        }
    }
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Empty => PayloadKind::Empty,
            Payload::License(_) => PayloadKind::License,
            Payload::OpenSubsonicExtensions(_) => PayloadKind::OpenSubsonicExtensions,
            Payload::TokenInfo(_) => PayloadKind::TokenInfo,
            Payload::User(_) => PayloadKind::User,
            Payload::MusicFolders(_) => PayloadKind::MusicFolders,
            Payload::Artists(_) => PayloadKind::Artists,
            Payload::Artist(_) => PayloadKind::Artist,
            Payload::Album(_) => PayloadKind::Album,
            Payload::Song(_) => PayloadKind::Song,
            Payload::Playlists(_) => PayloadKind::Playlists,
            Payload::Playlist(_) => PayloadKind::Playlist,
        }
    }

    fn to_value(&self) -> serde_json::Result<Option<Value>> {
        fn value_of<T: Serialize>(body: &T) -> serde_json::Result<Option<Value>> {
            serde_json::to_value(body).map(Some)
        }

        match self {
            Payload::Empty => Ok(None),
            Payload::License(body) => value_of(body),
            Payload::OpenSubsonicExtensions(body) => value_of(body),
            Payload::TokenInfo(body) => value_of(body),
            Payload::User(body) => value_of(body),
            Payload::MusicFolders(body) => value_of(body),
            Payload::Artists(body) => value_of(body),
            Payload::Artist(body) => value_of(body),
            Payload::Album(body) => value_of(body),
            Payload::Song(body) => value_of(body),
            Payload::Playlists(body) => value_of(body),
            Payload::Playlist(body) => value_of(body),
        }
    }
}

// ========================================
// Envelope
// ========================================

/// `error` body of a failed envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Success(Payload),
    Failure(ErrorBody),
}

/// The outcome of one request, ready to be rendered in any wire format
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    outcome: Outcome,
    /// Product identity, set only on the probe endpoint
    server_identity: bool,
}

impl Envelope {
    pub fn ok(payload: Payload) -> Self {
        Self {
            outcome: Outcome::Success(payload),
            server_identity: false,
        }
    }

    /// Successful probe response carrying product name and build version
    pub fn probe() -> Self {
        Self {
            outcome: Outcome::Success(Payload::Empty),
            server_identity: true,
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure(ErrorBody {
                code,
                message: message.into(),
            }),
            server_identity: false,
        }
    }

    pub fn from_error(err: &ApiError) -> Self {
        Self::failed(err.code(), err.client_message())
    }

    pub fn from_result(result: Result<Payload>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(err) => Self::from_error(&err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        match &self.outcome {
            Outcome::Failure(body) => Some(body),
            Outcome::Success(_) => None,
        }
    }

    /// HTTP status: 200 on success, otherwise from the error code table
    pub fn http_status(&self) -> StatusCode {
        match &self.outcome {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::Failure(body) => body.code.http_status(),
        }
    }

    /// Logical content of the envelope, independent of wire format
    ///
    /// The namespace is left out: markup adds it as the `xmlns` attribute of
    /// the document element, and Subsonic JSON clients never receive one.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "status".to_string(),
            Value::from(if self.is_ok() { "ok" } else { "failed" }),
        );
        map.insert("version".to_string(), Value::from(API_VERSION));

        if self.server_identity {
            map.insert("type".to_string(), Value::from(SERVER_TYPE));
            map.insert(
                "serverVersion".to_string(),
                Value::from(env!("CARGO_PKG_VERSION")),
            );
        }

        match &self.outcome {
            Outcome::Success(payload) => {
                map.insert("openSubsonic".to_string(), Value::Bool(true));
                insert_payload(&mut map, payload);
            }
            Outcome::Failure(body) => {
                let mut error = Map::new();
                error.insert("code".to_string(), Value::from(body.code.code()));
                error.insert("message".to_string(), Value::from(body.message.clone()));
                map.insert("error".to_string(), Value::Object(error));
            }
        }

        map
    }

    /// Serialize for the wire
    pub fn render(&self, format: &Format) -> Result<Vec<u8>> {
        let content = self.to_map();
        match format {
            Format::Xml => xml::render_document(ROOT_ELEMENT, XML_NAMESPACE, &content),
            Format::Json => json_document(content),
            Format::Jsonp(callback) => {
                let json = json_document(content)?;
                let mut body = Vec::with_capacity(json.len() + callback.len() + 3);
                body.extend_from_slice(callback.as_bytes());
                body.push(b'(');
                body.extend_from_slice(&json);
                body.extend_from_slice(b");");
                Ok(body)
            }
        }
    }
}

/// Nest a payload under its key; a payload that fails to serialize is logged
/// and left out rather than failing the response
fn insert_payload(map: &mut Map<String, Value>, payload: &Payload) {
    let kind = payload.kind();
    let Some(key) = kind.key() else {
        return;
    };

    match payload.to_value() {
        Ok(Some(value)) => {
            map.insert(key.to_string(), value);
        }
        Ok(None) => {}
        Err(e) => error!("Omitting {:?} payload that failed to serialize: {}", kind, e),
    }
}

fn json_document(content: Map<String, Value>) -> Result<Vec<u8>> {
    let mut root = Map::new();
    root.insert(ROOT_ELEMENT.to_string(), Value::Object(content));
    serde_json::to_vec(&Value::Object(root))
        .map_err(|e| ApiError::Internal(format!("JSON serialization failed: {}", e)))
}

// ========================================
// HTTP Response
// ========================================

/// An envelope paired with the format the client asked for
#[derive(Debug, Clone)]
pub struct Reply {
    pub envelope: Envelope,
    pub format: Format,
}

impl Reply {
    pub fn new(envelope: Envelope, format: Format) -> Self {
        Self { envelope, format }
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let status = self.envelope.http_status();
        match self.envelope.render(&self.format) {
            Ok(body) => (
                status,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(self.format.content_type()),
                )],
                body,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to render response envelope: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use serde_json::json;
    use std::collections::{BTreeMap, HashSet};

    #[test]
    fn test_format_selection() {
        assert_eq!(Format::from_params(None, None), Format::Xml);
        assert_eq!(Format::from_params(Some("xml"), None), Format::Xml);
        assert_eq!(Format::from_params(Some("bogus"), None), Format::Xml);
        assert_eq!(Format::from_params(Some("json"), Some("cb")), Format::Json);
        assert_eq!(
            Format::from_params(Some("jsonp"), Some("cb")),
            Format::Jsonp("cb".to_string())
        );
        assert_eq!(Format::from_params(Some("jsonp"), None), Format::Json);
        assert_eq!(Format::from_params(Some("jsonp"), Some("")), Format::Json);
        assert_eq!(
            Format::from_params(Some("jsonp"), Some("alert(1);x")),
            Format::Json
        );
    }

    #[test]
    fn test_every_payload_kind_has_a_distinct_key() {
        let keys: Vec<&str> = PayloadKind::ALL.iter().filter_map(|k| k.key()).collect();
        assert_eq!(keys.len(), PayloadKind::ALL.len() - 1);

        let unique: HashSet<&str> = keys.iter().copied().collect();
        assert_eq!(unique.len(), keys.len());
        assert!(!unique.contains("error"));
    }

    #[test]
    fn test_success_envelope_fields() {
        let map = Envelope::ok(Payload::License(License { valid: true })).to_map();
        assert_eq!(map["status"], json!("ok"));
        assert_eq!(map["version"], json!(API_VERSION));
        assert_eq!(map["openSubsonic"], json!(true));
        assert_eq!(map["license"], json!({"valid": true}));
        assert!(map.get("error").is_none());
        assert!(map.get("type").is_none());
        assert!(map.get("serverVersion").is_none());
    }

    #[test]
    fn test_probe_envelope_carries_server_identity() {
        let map = Envelope::probe().to_map();
        assert_eq!(map["type"], json!(SERVER_TYPE));
        assert_eq!(map["serverVersion"], json!(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_error_envelope_fields() {
        let envelope = Envelope::failed(ErrorCode::WrongCredentials, "Wrong username or password.");
        let map = envelope.to_map();
        assert_eq!(map["status"], json!("failed"));
        assert_eq!(
            map["error"],
            json!({"code": 40, "message": "Wrong username or password."})
        );
        assert!(map.get("openSubsonic").is_none());
        assert_eq!(envelope.http_status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_http_status_from_outcome() {
        assert_eq!(Envelope::ok(Payload::Empty).http_status(), StatusCode::OK);
        assert_eq!(
            Envelope::from_error(&ApiError::MissingParameter("id".into())).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Envelope::from_error(&ApiError::NotFound("Song".into())).http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Envelope::from_error(&ApiError::Internal("x".into())).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_json_and_jsonp_framing() {
        let envelope = Envelope::ok(Payload::TokenInfo(TokenInfo {
            username: "alice".into(),
        }));

        let json = envelope.render(&Format::Json).unwrap();
        let parsed: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed[ROOT_ELEMENT]["tokenInfo"]["username"], json!("alice"));

        let jsonp = envelope.render(&Format::Jsonp("cb".into())).unwrap();
        let jsonp = String::from_utf8(jsonp).unwrap();
        assert!(jsonp.starts_with("cb("));
        assert!(jsonp.ends_with(");"));
        let inner = &jsonp[3..jsonp.len() - 2];
        assert_eq!(inner.as_bytes(), json.as_slice());
    }

    fn song(id: &str, title: &str, track: i64) -> Child {
        Child {
            id: id.into(),
            parent: "10".into(),
            is_dir: false,
            title: title.into(),
            album: "Revolver".into(),
            artist: "The Beatles".into(),
            track: Some(track),
            year: Some(1966),
            size: 10,
            content_type: "audio/mpeg".into(),
            suffix: "mp3".into(),
            duration: 150,
            path: format!("beatles/revolver/{}.mp3", id),
            album_id: "10".into(),
            artist_id: "1".into(),
            media_type: "music".into(),
            created: "2024-01-01T00:00:00Z".into(),
        }
    }

    /// Element as parsed back from markup: depth, name, attributes
    type ParsedElement = (usize, String, BTreeMap<String, String>);

    fn parse_elements(xml: &str) -> Vec<ParsedElement> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut elements = Vec::new();
        let mut depth = 0;
        loop {
            let (start, empty) = match reader.read_event().unwrap() {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(_) => {
                    depth -= 1;
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let name = String::from_utf8(start.name().as_ref().to_vec()).unwrap();
            let attributes = start
                .attributes()
                .map(|attr| {
                    let attr = attr.unwrap();
                    (
                        String::from_utf8(attr.key.as_ref().to_vec()).unwrap(),
                        attr.unescape_value().unwrap().into_owned(),
                    )
                })
                .collect();
            elements.push((depth, name, attributes));
            if !empty {
                depth += 1;
            }
        }
        elements
    }

    /// Scalar members of a JSON object in their attribute text form
    fn scalar_members(members: &Map<String, Value>) -> BTreeMap<String, String> {
        members
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(_) | Value::Bool(_) => value.to_string(),
                    _ => return None,
                };
                Some((key.clone(), text))
            })
            .collect()
    }

    #[test]
    fn test_all_formats_carry_the_same_fields() {
        let album = AlbumWithSongs {
            album: Album {
                id: "10".into(),
                name: "Revolver".into(),
                artist: "The Beatles".into(),
                artist_id: "1".into(),
                song_count: 2,
                duration: 300,
                year: Some(1966),
                created: "2024-01-01T00:00:00Z".into(),
            },
            song: vec![song("100", "Taxman", 1), song("101", "Eleanor Rigby & Co", 2)],
        };
        let envelope = Envelope {
            outcome: Outcome::Success(Payload::Album(album)),
            server_identity: true,
        };
        let map = envelope.to_map();

        // JSON is the logical map under the root key; JSONP wraps it unchanged
        let json = envelope.render(&Format::Json).unwrap();
        let parsed: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed[ROOT_ELEMENT], Value::Object(map.clone()));

        let jsonp = String::from_utf8(envelope.render(&Format::Jsonp("cb".into())).unwrap()).unwrap();
        assert_eq!(jsonp[3..jsonp.len() - 2].as_bytes(), json.as_slice());

        // Markup: the document element holds the envelope scalars as attributes
        let xml = String::from_utf8(envelope.render(&Format::Xml).unwrap()).unwrap();
        let elements = parse_elements(&xml);

        let (depth, name, mut root_attrs) = elements[0].clone();
        assert_eq!((depth, name.as_str()), (0, ROOT_ELEMENT));
        assert_eq!(root_attrs.remove("xmlns").as_deref(), Some(XML_NAMESPACE));
        assert_eq!(root_attrs, scalar_members(&map));
        assert!(root_attrs.contains_key("serverVersion"));

        let root_children: Vec<&str> = elements
            .iter()
            .filter(|(depth, _, _)| *depth == 1)
            .map(|(_, name, _)| name.as_str())
            .collect();
        assert_eq!(root_children, vec!["album"]);

        let album_map = map["album"].as_object().unwrap();
        assert_eq!(elements[1].2, scalar_members(album_map));

        let songs: Vec<&BTreeMap<String, String>> = elements
            .iter()
            .filter(|(depth, name, _)| *depth == 2 && name == "song")
            .map(|(_, _, attrs)| attrs)
            .collect();
        let expected: Vec<BTreeMap<String, String>> = album_map["song"]
            .as_array()
            .unwrap()
            .iter()
            .map(|song| scalar_members(song.as_object().unwrap()))
            .collect();
        assert_eq!(songs.len(), expected.len());
        for (xml_song, json_song) in songs.into_iter().zip(&expected) {
            assert_eq!(xml_song, json_song);
        }
    }

    #[test]
    fn test_xml_framing() {
        let envelope = Envelope::failed(ErrorCode::NotFound, "The requested data was not found.");
        let xml = String::from_utf8(envelope.render(&Format::Xml).unwrap()).unwrap();
        assert!(xml.contains(r#"<subsonic-response xmlns="http://subsonic.org/restapi""#));
        assert!(xml.contains(r#"status="failed""#));
        assert!(xml.contains(r#"<error code="70" message="The requested data was not found."/>"#));
    }

    #[test]
    fn test_empty_payload_adds_no_key() {
        let map = Envelope::ok(Payload::Empty).to_map();
        let keys: HashSet<&str> = map.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, HashSet::from(["status", "version", "openSubsonic"]));
    }
}
