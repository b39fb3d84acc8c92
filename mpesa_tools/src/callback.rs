//! Payload types for the STK push result callback.
//!
//! ```json
//! {"Body": {"stkCallback": {
//!     "MerchantRequestID": "29115-34620561-1",
//!     "CheckoutRequestID": "ws_CO_191220191020363925",
//!     "ResultCode": 0,
//!     "ResultDesc": "The service request is processed successfully.",
//!     "CallbackMetadata": {"Item": [
//!         {"Name": "Amount", "Value": 1.00},
//!         {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
//!         {"Name": "TransactionDate", "Value": 20191219102115},
//!         {"Name": "PhoneNumber", "Value": 254708374149}
//!     ]}
//! }}}
//! ```
//! `CallbackMetadata` is only present on successful transactions.
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::helpers::string_or_int;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "string_or_int")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl CallbackMetadata {
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.items.iter().find(|i| i.name == name).and_then(|i| i.value.as_ref())
    }

    /// Returns the named value as a string, whether it was sent as a JSON string or number.
    pub fn string_value_of(&self, name: &str) -> Option<String> {
        match self.value_of(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn receipt_number(&self) -> Option<String> {
        self.string_value_of("MpesaReceiptNumber")
    }

    pub fn amount(&self) -> Option<f64> {
        match self.value_of("Amount")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn phone_number(&self) -> Option<String> {
        self.string_value_of("PhoneNumber")
    }

    pub fn transaction_date(&self) -> Option<String> {
        self.string_value_of("TransactionDate")
    }
}

impl StkCallbackEnvelope {
    pub fn into_callback(self) -> StkCallback {
        self.body.stk_callback
    }
}
