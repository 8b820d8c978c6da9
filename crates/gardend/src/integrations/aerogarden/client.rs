use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const API_PATH_LOGIN: &str = "/api/Admin/Login";
pub const API_PATH_QUERY_USER_DEVICE: &str = "/api/CustomData/QueryUserDevice";
pub const API_PATH_UPDATE_DEVICE_CONFIG: &str = "/api/Custom/UpdateDeviceConfig";

/// Form field names the vendor API expects
const FORM_KEY_EMAIL: &str = "mail";
const FORM_KEY_PASSWORD: &str = "userPwd";
const FORM_KEY_USER_ID: &str = "userID";
const FORM_KEY_AIR_GUID: &str = "airGuid";
const FORM_KEY_CHOOSE_GARDEN: &str = "chooseGarden";
const FORM_KEY_PLANT_CONFIG: &str = "plantConfig";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Reason the vendor rejected a login, derived from the response `code`
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AuthFailure {
    #[strum(serialize = "user credentials provided are invalid")]
    InvalidCredentials,

    #[strum(serialize = "user account does not exist")]
    AccountNotFound,

    #[strum(serialize = "login failed")]
    LoginFailed,
}

/// Errors from the AeroGarden API, split into the three kinds callers care
/// about: connectivity, authentication, and application-level failures.
#[derive(Debug, Error)]
pub enum GardenApiError {
    /// Unreachable host, a non-2xx HTTP status, or a call made before login
    #[error("connection to the AeroGarden API failed: {0}")]
    Connect(String),

    /// The vendor rejected the login attempt
    #[error("AeroGarden authentication failed: {0}")]
    Auth(AuthFailure),

    /// The request reached the API but the response carried an error code
    #[error("AeroGarden API returned an error: {0}")]
    Api(String),
}

/// Trait for AeroGarden API operations
///
/// This trait is the seam between the garden registry cache and the vendor
/// API, and allows mocking the client for testing purposes
#[async_trait]
pub trait GardenClient: Send + Sync {
    /// Whether a login has succeeded and a session id is held
    fn is_logged_in(&self) -> bool;

    /// Log in with the configured credentials, storing the returned user id
    /// as the session identifier for subsequent calls
    async fn login(&mut self) -> Result<(), GardenApiError>;

    /// Fetch the raw device records for the logged-in account
    async fn get_user_devices(&mut self) -> Result<Vec<Value>, GardenApiError>;

    /// Patch a garden's config with a JSON-encoded partial plant config
    async fn update_device_config(
        &mut self,
        air_guid: &str,
        choose_garden: i64,
        plant_config: &str,
    ) -> Result<(), GardenApiError>;
}

/// Real AeroGarden API client implementation using reqwest
pub struct HttpGardenClient {
    host: String,
    email: String,
    password: String,

    /// Session/user id returned by a successful login. 0 means not logged in.
    user_id: i64,

    http: reqwest::Client,
}

impl HttpGardenClient {
    pub fn new(host: &str, email: &str, password: &str) -> Result<Self, GardenApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!(
                "gardend-aerogarden/{}",
                env!("CARGO_PKG_VERSION")
            ))
            .map_err(|e| GardenApiError::Connect(e.to_string()))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| GardenApiError::Connect(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            email: email.to_string(),
            password: password.to_string(),
            user_id: 0,
            http,
        })
    }

    async fn post(&self, path: &str, form: &[(&str, String)]) -> Result<Value, GardenApiError> {
        let url = format!("{}{}", self.host, path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| GardenApiError::Connect(e.to_string()))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(GardenApiError::Connect(format!(
                "HTTP request was unsuccessful with status code {}",
                status.as_u16()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GardenApiError::Connect(format!("invalid response body: {}", e)))
    }

    fn require_login(&self) -> Result<i64, GardenApiError> {
        if self.user_id > 0 {
            Ok(self.user_id)
        } else {
            Err(GardenApiError::Connect(
                "AeroGarden client is not logged in".to_string(),
            ))
        }
    }

    #[cfg(test)]
    fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }
}

#[async_trait]
impl GardenClient for HttpGardenClient {
    fn is_logged_in(&self) -> bool {
        self.user_id > 0
    }

    async fn login(&mut self) -> Result<(), GardenApiError> {
        let body = self
            .post(
                API_PATH_LOGIN,
                &[
                    (FORM_KEY_EMAIL, self.email.clone()),
                    (FORM_KEY_PASSWORD, self.password.clone()),
                ],
            )
            .await?;

        let code = body
            .get("code")
            .and_then(Value::as_i64)
            .ok_or_else(|| GardenApiError::Api("login response missing code".to_string()))?;

        if code <= 0 {
            return Err(GardenApiError::Auth(match code {
                -4 => AuthFailure::InvalidCredentials,
                -2 => AuthFailure::AccountNotFound,
                _ => AuthFailure::LoginFailed,
            }));
        }

        self.user_id = code;
        Ok(())
    }

    async fn get_user_devices(&mut self) -> Result<Vec<Value>, GardenApiError> {
        let user_id = self.require_login()?;

        let body = self
            .post(
                API_PATH_QUERY_USER_DEVICE,
                &[(FORM_KEY_USER_ID, user_id.to_string())],
            )
            .await?;

        body.as_array()
            .cloned()
            .ok_or_else(|| GardenApiError::Api("device list response was not a list".to_string()))
    }

    async fn update_device_config(
        &mut self,
        air_guid: &str,
        choose_garden: i64,
        plant_config: &str,
    ) -> Result<(), GardenApiError> {
        let user_id = self.require_login()?;

        let body = self
            .post(
                API_PATH_UPDATE_DEVICE_CONFIG,
                &[
                    (FORM_KEY_USER_ID, user_id.to_string()),
                    (FORM_KEY_AIR_GUID, air_guid.to_string()),
                    (FORM_KEY_CHOOSE_GARDEN, choose_garden.to_string()),
                    (FORM_KEY_PLANT_CONFIG, plant_config.to_string()),
                ],
            )
            .await?;

        let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code <= 0 {
            return Err(GardenApiError::Api(
                "patching device config was not successful".to_string(),
            ));
        }

        Ok(())
    }
}

/// Mock AeroGarden client for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockGardenClient {
    pub logged_in: bool,
    pub devices: Vec<Value>,
    pub fail_login: bool,
    pub fail_fetch: bool,
    pub login_calls: usize,
    pub fetch_calls: usize,
    pub config_updates: Vec<(String, i64, String)>,
}

#[cfg(test)]
impl MockGardenClient {
    pub fn with_devices(devices: Vec<Value>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl GardenClient for MockGardenClient {
    fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    async fn login(&mut self) -> Result<(), GardenApiError> {
        self.login_calls += 1;
        if self.fail_login {
            return Err(GardenApiError::Auth(AuthFailure::InvalidCredentials));
        }
        self.logged_in = true;
        Ok(())
    }

    async fn get_user_devices(&mut self) -> Result<Vec<Value>, GardenApiError> {
        self.fetch_calls += 1;
        if self.fail_fetch {
            return Err(GardenApiError::Connect("mock fetch failure".to_string()));
        }
        Ok(self.devices.clone())
    }

    async fn update_device_config(
        &mut self,
        air_guid: &str,
        choose_garden: i64,
        plant_config: &str,
    ) -> Result<(), GardenApiError> {
        self.config_updates.push((
            air_guid.to_string(),
            choose_garden,
            plant_config.to_string(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    const EMAIL: &str = "gardener@example.com";
    const PASSWORD: &str = "hunter2";
    const USER_ID: i64 = 123456;
    const AIR_GUID: &str = "12:34:56:78:10:AB";

    #[test]
    fn is_logged_in_false_before_login() {
        let client = HttpGardenClient::new("https://unittest.invalid", EMAIL, PASSWORD).unwrap();
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn login_stores_user_id_on_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", API_PATH_LOGIN)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mail".into(), EMAIL.into()),
                Matcher::UrlEncoded("userPwd".into(), PASSWORD.into()),
            ]))
            .with_status(200)
            .with_body(json!({ "code": USER_ID, "msg": "" }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD).unwrap();
        client.login().await.unwrap();

        assert!(client.is_logged_in());
        assert_eq!(client.user_id, USER_ID);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn login_maps_invalid_credentials_code() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", API_PATH_LOGIN)
            .with_status(200)
            .with_body(json!({ "code": -4 }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD).unwrap();
        let result = client.login().await;

        assert!(matches!(
            result,
            Err(GardenApiError::Auth(AuthFailure::InvalidCredentials))
        ));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn login_maps_account_not_found_code() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", API_PATH_LOGIN)
            .with_status(200)
            .with_body(json!({ "code": -2 }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD).unwrap();
        let result = client.login().await;

        assert!(matches!(
            result,
            Err(GardenApiError::Auth(AuthFailure::AccountNotFound))
        ));
    }

    #[tokio::test]
    async fn login_maps_other_codes_to_generic_failure() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", API_PATH_LOGIN)
            .with_status(200)
            .with_body(json!({ "code": -1 }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD).unwrap();
        let result = client.login().await;

        assert!(matches!(
            result,
            Err(GardenApiError::Auth(AuthFailure::LoginFailed))
        ));
    }

    #[tokio::test]
    async fn login_http_error_raises_connect_before_body_inspection() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", API_PATH_LOGIN)
            .with_status(500)
            // a body that would otherwise map to an auth error
            .with_body(json!({ "code": -4 }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD).unwrap();
        let result = client.login().await;

        assert!(matches!(result, Err(GardenApiError::Connect(_))));
    }

    #[tokio::test]
    async fn get_user_devices_returns_records() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", API_PATH_QUERY_USER_DEVICE)
            .match_body(Matcher::UrlEncoded("userID".into(), USER_ID.to_string()))
            .with_status(200)
            .with_body(
                json!([{ "configID": 987654, "airGuid": AIR_GUID, "chooseGarden": 0 }])
                    .to_string(),
            )
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD)
            .unwrap()
            .with_user_id(USER_ID);
        let devices = client.get_user_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0]["configID"], 987654);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn get_user_devices_requires_login() {
        let mut client =
            HttpGardenClient::new("https://unittest.invalid", EMAIL, PASSWORD).unwrap();
        let result = client.get_user_devices().await;
        assert!(matches!(result, Err(GardenApiError::Connect(_))));
    }

    #[tokio::test]
    async fn update_device_config_posts_patch() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", API_PATH_UPDATE_DEVICE_CONFIG)
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("userID".into(), USER_ID.to_string()),
                Matcher::UrlEncoded("airGuid".into(), AIR_GUID.into()),
                Matcher::UrlEncoded("chooseGarden".into(), "0".into()),
                Matcher::UrlEncoded("plantConfig".into(), r#"{"lightStat":1}"#.into()),
            ]))
            .with_status(200)
            .with_body(json!({ "code": 1, "msg": "" }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD)
            .unwrap()
            .with_user_id(USER_ID);
        client
            .update_device_config(AIR_GUID, 0, r#"{"lightStat":1}"#)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn update_device_config_error_code_raises_api_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", API_PATH_UPDATE_DEVICE_CONFIG)
            .with_status(200)
            .with_body(json!({ "code": -1 }).to_string())
            .create_async()
            .await;

        let mut client = HttpGardenClient::new(&server.url(), EMAIL, PASSWORD)
            .unwrap()
            .with_user_id(USER_ID);
        let result = client
            .update_device_config(AIR_GUID, 0, r#"{"lightStat":1}"#)
            .await;

        assert!(matches!(result, Err(GardenApiError::Api(_))));
    }

    #[tokio::test]
    async fn update_device_config_requires_login() {
        let mut client =
            HttpGardenClient::new("https://unittest.invalid", EMAIL, PASSWORD).unwrap();
        let result = client
            .update_device_config(AIR_GUID, 0, r#"{"lightStat":1}"#)
            .await;
        assert!(matches!(result, Err(GardenApiError::Connect(_))));
    }
}
