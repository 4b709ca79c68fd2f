//! API path construction for database users

use crate::models::DatabaseEngine;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped in a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode a value for use as one URL path segment
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// `/cloud/project/{service}/database/{engine}/{cluster}/user`
pub fn user_collection_path(service_name: &str, engine: DatabaseEngine, cluster_id: &str) -> String {
    format!(
        "/cloud/project/{}/database/{}/{}/user",
        encode_segment(service_name),
        engine.as_str(),
        encode_segment(cluster_id)
    )
}

/// `/cloud/project/{service}/database/{engine}/{cluster}/user/{user}`
pub fn user_path(
    service_name: &str,
    engine: DatabaseEngine,
    cluster_id: &str,
    user_id: &str,
) -> String {
    format!(
        "{}/{}",
        user_collection_path(service_name, engine, cluster_id),
        encode_segment(user_id)
    )
}
