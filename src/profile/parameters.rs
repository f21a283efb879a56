//! Build parameter schema for agents using the HTTP profile.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Kind of value a parameter holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    /// Days from build time.
    Date,
    Dictionary,
    ChooseOne,
}

/// A suggested key for a dictionary parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryChoice {
    pub name: String,
    /// Whether the key is pre-filled in the build form.
    pub default_show: bool,
    pub default_value: String,
}

/// One build parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileParameter {
    pub name: String,
    pub description: String,
    pub default_value: Value,
    pub parameter_type: ParameterType,
    pub required: bool,
    /// Regex the value must match, empty for none.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub verifier_regex: String,
    #[serde(default)]
    pub is_crypto_type: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dictionary_choices: Vec<DictionaryChoice>,
}

impl ProfileParameter {
    fn new(name: &str, description: &str, parameter_type: ParameterType, default_value: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_value,
            parameter_type,
            required: false,
            verifier_regex: String::new(),
            is_crypto_type: false,
            choices: Vec::new(),
            dictionary_choices: Vec::new(),
        }
    }

    fn verified_by(mut self, regex: &str) -> Self {
        self.verifier_regex = regex.into();
        self
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

const DIGITS: &str = "^[0-9]+$";
const NO_LEADING_SLASH: &str = "^[^\\/].*";

/// Default `User-Agent` offered for new agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.3; Trident/7.0; rv:11.0) like Gecko";

/// Default `callback_host`; flagged by the OPSEC check.
pub const DEFAULT_CALLBACK_HOST: &str = "https://domain.com";

/// The parameters, in display order.
pub fn http_parameters() -> Vec<ProfileParameter> {
    use ParameterType as Kind;

    let mut headers = ProfileParameter::new("headers", "HTTP Headers", Kind::Dictionary, Value::Null);
    headers.dictionary_choices = vec![
        DictionaryChoice {
            name: "User-Agent".into(),
            default_show: true,
            default_value: DEFAULT_USER_AGENT.into(),
        },
        DictionaryChoice {
            name: "Host".into(),
            default_show: false,
            default_value: String::new(),
        },
    ];

    let mut aes_psk = ProfileParameter::new("AESPSK", "Encryption Type", Kind::ChooseOne, json!("aes256_hmac"));
    aes_psk.is_crypto_type = true;
    aes_psk.choices = vec!["aes256_hmac".into(), "none".into()];

    vec![
        ProfileParameter::new("callback_port", "Callback Port", Kind::Number, json!(80)).verified_by(DIGITS),
        ProfileParameter::new("killdate", "Kill Date", Kind::Date, json!(365)),
        ProfileParameter::new("encrypted_exchange_check", "Perform Key Exchange", Kind::Boolean, json!(true)),
        ProfileParameter::new("callback_jitter", "Callback Jitter in percent", Kind::Number, json!(23))
            .verified_by(DIGITS),
        headers,
        aes_psk,
        ProfileParameter::new("callback_host", "Callback Host", Kind::String, json!(DEFAULT_CALLBACK_HOST))
            .verified_by("^(http|https):\\/\\/[^\\/:]*$")
            .required(),
        ProfileParameter::new("get_uri", "GET request URI (don't include leading /)", Kind::String, json!("index"))
            .verified_by(NO_LEADING_SLASH),
        ProfileParameter::new("post_uri", "POST request URI (don't include leading /)", Kind::String, json!("data"))
            .verified_by(NO_LEADING_SLASH),
        ProfileParameter::new("query_path_name", "Name of the query parameter for GET requests", Kind::String, json!("q"))
            .verified_by(NO_LEADING_SLASH),
        ProfileParameter::new("proxy_host", "Proxy Host", Kind::String, json!(""))
            .verified_by("^$|^(http|https):\\/\\/[a-zA-Z0-9]+"),
        ProfileParameter::new("proxy_port", "Proxy Port", Kind::String, json!("")).verified_by("^$|^[0-9]+$"),
        ProfileParameter::new("proxy_user", "Proxy Username", Kind::String, json!("")),
        ProfileParameter::new("proxy_pass", "Proxy Password", Kind::String, json!("")),
        ProfileParameter::new("callback_interval", "Callback Interval in seconds", Kind::Number, json!(10))
            .verified_by(DIGITS),
    ]
}
