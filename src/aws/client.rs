use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::audit::snapshot::{AccessKeySnapshot, KeyStatus, UserSnapshot};
use crate::aws::credentials::Credentials;
use crate::aws::sigv4;
use crate::error::AuditError;

const API_VERSION: &str = "2010-05-08";
const GLOBAL_ENDPOINT: &str = "https://iam.amazonaws.com";

/// A user entry from ListUsers, before snapshot assembly.
#[derive(Debug, Clone)]
pub struct IamUser {
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// An access key entry from ListAccessKeys.
#[derive(Debug, Clone)]
pub struct AccessKeyMetadata {
    pub key_id: String,
    pub user_name: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

/// Capability interface over the identity API.
///
/// The audit core only needs these four read operations; how authentication
/// and pagination happen is the implementation's business. Every method
/// returns the complete result set.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn list_users(&self) -> Result<Vec<IamUser>, AuditError>;

    async fn list_mfa_devices(&self, user_name: &str) -> Result<Vec<String>, AuditError>;

    async fn list_access_keys(
        &self,
        user_name: &str,
    ) -> Result<Vec<AccessKeyMetadata>, AuditError>;

    async fn access_key_last_used(
        &self,
        key_id: &str,
    ) -> Result<Option<DateTime<Utc>>, AuditError>;
}

/// Materialize the full account state before evaluation begins.
///
/// Walks users, MFA devices, keys and last-used metadata sequentially; any
/// error aborts the whole collection so evaluation never sees partial data.
pub async fn collect_snapshots<S: IdentitySource + ?Sized>(
    source: &S,
) -> Result<BTreeMap<String, UserSnapshot>, AuditError> {
    let mut snapshots = BTreeMap::new();
    for user in source.list_users().await? {
        let mfa_devices = source.list_mfa_devices(&user.user_name).await?;
        let mut access_keys = Vec::new();
        for key in source.list_access_keys(&user.user_name).await? {
            let last_used_at = source.access_key_last_used(&key.key_id).await?;
            access_keys.push(AccessKeySnapshot {
                key_id: key.key_id,
                user_name: key.user_name,
                status: key.status,
                created_at: key.created_at,
                last_used_at,
            });
        }
        snapshots.insert(
            user.user_name.clone(),
            UserSnapshot {
                user_name: user.user_name,
                created_at: user.created_at,
                mfa_devices,
                access_keys,
            },
        );
    }
    Ok(snapshots)
}

/// Client for the IAM Query API.
///
/// Sends signed `POST /` form requests and asks for JSON responses. IAM is a
/// global service, so the default endpoint is `iam.amazonaws.com`; tests
/// point `endpoint` at a local stub server instead.
pub struct IamClient {
    http: reqwest::Client,
    credentials: Credentials,
    region: String,
    endpoint: String,
    host: String,
}

impl IamClient {
    pub fn new(credentials: Credentials, region: &str) -> Result<Self, AuditError> {
        Self::with_endpoint(credentials, region, GLOBAL_ENDPOINT)
    }

    pub fn with_endpoint(
        credentials: Credentials,
        region: &str,
        endpoint: &str,
    ) -> Result<Self, AuditError> {
        let url = reqwest::Url::parse(endpoint)
            .map_err(|e| AuditError::Configuration(format!("invalid endpoint {}: {}", endpoint, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => {
                return Err(AuditError::Configuration(format!(
                    "endpoint {} has no host",
                    endpoint
                )))
            }
        };
        Ok(IamClient {
            http: reqwest::Client::new(),
            credentials,
            region: region.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            host,
        })
    }

    /// One signed Query API call, unwrapped to the `<Action>Result` object.
    async fn query(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, AuditError> {
        let mut body = format!("Action={}&Version={}", action, API_VERSION);
        for (name, value) in params {
            body.push_str(&format!("&{}={}", name, form_encode(value)));
        }

        let signed = sigv4::sign_request(
            &self.credentials,
            &self.region,
            "iam",
            &self.host,
            &body,
            Utc::now(),
        );

        let mut request = self
            .http
            .post(&self.endpoint)
            .header("content-type", sigv4::CONTENT_TYPE)
            .header("x-amz-date", &signed.amz_date)
            .header("authorization", &signed.authorization)
            .header("accept", "application/json")
            .body(body);
        if let Some(token) = &self.credentials.session_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let brief: String = text.chars().take(200).collect();
            return Err(AuditError::Fetch(format!(
                "{} returned HTTP {}: {}",
                action, status, brief
            )));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| AuditError::Fetch(format!("{} returned malformed JSON: {}", action, e)))?;
        value
            .get(format!("{}Response", action))
            .and_then(|v| v.get(format!("{}Result", action)))
            .cloned()
            .ok_or_else(|| {
                AuditError::Fetch(format!("{} response missing result object", action))
            })
    }
}

#[async_trait]
impl IdentitySource for IamClient {
    async fn list_users(&self) -> Result<Vec<IamUser>, AuditError> {
        let mut users = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut params: Vec<(&str, &str)> = Vec::new();
            if let Some(m) = marker.as_deref() {
                params.push(("Marker", m));
            }
            let result = self.query("ListUsers", &params).await?;

            for item in array_of(&result, "Users") {
                let user_name = required_str(item, "UserName", "ListUsers")?;
                let created_at = required_timestamp(item, "CreateDate", "ListUsers")?;
                users.push(IamUser {
                    user_name,
                    created_at,
                });
            }

            match next_marker(&result) {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(users)
    }

    async fn list_mfa_devices(&self, user_name: &str) -> Result<Vec<String>, AuditError> {
        let mut devices = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut params: Vec<(&str, &str)> = vec![("UserName", user_name)];
            if let Some(m) = marker.as_deref() {
                params.push(("Marker", m));
            }
            let result = self.query("ListMFADevices", &params).await?;

            for item in array_of(&result, "MFADevices") {
                devices.push(required_str(item, "SerialNumber", "ListMFADevices")?);
            }

            match next_marker(&result) {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(devices)
    }

    async fn list_access_keys(
        &self,
        user_name: &str,
    ) -> Result<Vec<AccessKeyMetadata>, AuditError> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut params: Vec<(&str, &str)> = vec![("UserName", user_name)];
            if let Some(m) = marker.as_deref() {
                params.push(("Marker", m));
            }
            let result = self.query("ListAccessKeys", &params).await?;

            for item in array_of(&result, "AccessKeyMetadata") {
                let status = item
                    .get("Status")
                    .and_then(Value::as_str)
                    .map(KeyStatus::from_api)
                    .unwrap_or(KeyStatus::Inactive);
                keys.push(AccessKeyMetadata {
                    key_id: required_str(item, "AccessKeyId", "ListAccessKeys")?,
                    user_name: user_name.to_string(),
                    status,
                    created_at: required_timestamp(item, "CreateDate", "ListAccessKeys")?,
                });
            }

            match next_marker(&result) {
                Some(m) => marker = Some(m),
                None => break,
            }
        }
        Ok(keys)
    }

    async fn access_key_last_used(
        &self,
        key_id: &str,
    ) -> Result<Option<DateTime<Utc>>, AuditError> {
        let params: Vec<(&str, &str)> = vec![("AccessKeyId", key_id)];
        let result = self.query("GetAccessKeyLastUsed", &params).await?;
        // LastUsedDate is absent for keys that have never been used.
        Ok(result
            .get("AccessKeyLastUsed")
            .and_then(|v| v.get("LastUsedDate"))
            .and_then(parse_timestamp))
    }
}

fn array_of<'a>(result: &'a Value, field: &str) -> impl Iterator<Item = &'a Value> {
    result
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
}

fn required_str(item: &Value, field: &str, action: &str) -> Result<String, AuditError> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AuditError::Fetch(format!("{} entry missing {}", action, field)))
}

fn required_timestamp(item: &Value, field: &str, action: &str) -> Result<DateTime<Utc>, AuditError> {
    item.get(field)
        .and_then(parse_timestamp)
        .ok_or_else(|| AuditError::Fetch(format!("{} entry missing {}", action, field)))
}

/// The Query-to-JSON bridge reports dates as epoch seconds; string timestamps
/// are accepted as well.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_f64()? as i64, 0),
        Value::String(s) => s.parse::<DateTime<Utc>>().ok(),
        _ => None,
    }
}

fn next_marker(result: &Value) -> Option<String> {
    let truncated = result
        .get("IsTruncated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !truncated {
        return None;
    }
    result
        .get("Marker")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn form_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
