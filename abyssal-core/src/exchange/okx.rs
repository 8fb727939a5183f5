//! OKX-shaped wire types and authentication (§6.3).
//!
//! Inbound depth and private-channel frames are treated as opaque JSON
//! elsewhere in the crate (`depth_engine::DepthFrame` for the public
//! side); this module covers the private-channel shapes the Lifecycle
//! Engine consumes plus the HMAC-SHA256 login-frame signature OKX's
//! private WebSocket requires on connect.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign `timestamp + "GET" + "/users/self/verify"` with the account
/// secret, base64-encoded, for the private-channel login frame (§6.3).
pub fn sign_login(secret: &str, timestamp: &str) -> String {
    let message = format!("{timestamp}GET/users/self/verify");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(message.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// The private-channel login frame sent immediately on connection (§6.3).
#[derive(Debug, Clone, Serialize)]
pub struct LoginFrame {
    pub op: &'static str,
    pub args: Vec<LoginArgs>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginArgs {
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub sign: String,
}

impl LoginFrame {
    pub fn new(api_key: &str, passphrase: &str, secret: &str, timestamp: &str) -> Self {
        Self {
            op: "login",
            args: vec![LoginArgs {
                api_key: api_key.to_string(),
                passphrase: passphrase.to_string(),
                timestamp: timestamp.to_string(),
                sign: sign_login(secret, timestamp),
            }],
        }
    }
}

/// One order-channel fill report on the private order feed.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderChannelFrame {
    #[serde(rename = "ordId")]
    pub exchange_id: String,
    #[serde(rename = "accFillSz")]
    pub cumulative_filled: String,
    #[serde(rename = "avgPx")]
    pub avg_price: String,
    pub side: String,
    pub state: String,
    #[serde(rename = "fillTime", default)]
    pub fill_time: String,
}

/// One position-channel sample, used to drive `maxdd` tracking (§4.4.4).
#[derive(Debug, Clone, Deserialize)]
pub struct PositionChannelFrame {
    #[serde(rename = "uplRatio")]
    pub unrealised_pnl_ratio: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_login_is_deterministic_for_fixed_inputs() {
        let sig1 = sign_login("secret", "2024-01-01T00:00:00.000Z");
        let sig2 = sign_login("secret", "2024-01-01T00:00:00.000Z");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn sign_login_changes_with_timestamp() {
        let sig1 = sign_login("secret", "2024-01-01T00:00:00.000Z");
        let sig2 = sign_login("secret", "2024-01-01T00:00:01.000Z");
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn login_frame_carries_one_arg_set() {
        let frame = LoginFrame::new("key", "pass", "secret", "ts");
        assert_eq!(frame.op, "login");
        assert_eq!(frame.args.len(), 1);
        assert_eq!(frame.args[0].api_key, "key");
    }
}
