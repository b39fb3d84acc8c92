use chrono::{DateTime, Duration, Utc};
use donate_common::{Kes, PhoneNumber};
use serde::{Deserialize, Serialize};

use crate::helpers::string_or_int;

/// The caller-supplied part of an STK push. [`crate::MpesaApi::stk_push`] fills in the credentials.
#[derive(Debug, Clone)]
pub struct StkPushParams {
    pub phone: PhoneNumber,
    pub amount: Kes,
    /// Shows up on the customer's statement. Daraja truncates it at 12 characters.
    pub account_reference: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

impl StkPushResponse {
    /// `"0"` means Safaricom accepted the request and is prompting the customer. It does _not_ mean the customer
    /// has paid.
    pub fn is_accepted(&self) -> bool {
        self.response_code.trim() == "0"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkQueryRequest {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode", deserialize_with = "string_or_int")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "MpesaReceiptNumber", default)]
    pub mpesa_receipt_number: Option<String>,
}

/// Body of non-2xx Daraja responses
#[derive(Debug, Clone, Deserialize)]
pub struct DarajaErrorResponse {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: String,
    #[serde(rename = "errorMessage", default)]
    pub error_message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(deserialize_with = "string_or_int")]
    pub expires_in: i64,
}

impl AccessToken {
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::seconds(self.expires_in)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_request_uses_daraja_field_names() {
        let req = StkPushRequest {
            business_short_code: "174379".into(),
            password: "pw".into(),
            timestamp: "20240101120000".into(),
            transaction_type: "CustomerPayBillOnline".into(),
            amount: 500,
            party_a: "254712345678".into(),
            party_b: "174379".into(),
            phone_number: "254712345678".into(),
            call_back_url: "https://example.com/mpesa/callback".into(),
            account_reference: "DONATION-1".into(),
            transaction_desc: "Donation to Clean Water".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["PartyA"], "254712345678");
        assert_eq!(json["CallBackURL"], "https://example.com/mpesa/callback");
        assert_eq!(json["Amount"], 500);
        assert_eq!(json["TransactionDesc"], "Donation to Clean Water");
    }

    #[test]
    fn push_response() {
        let json = r#"{
            "MerchantRequestID": "29115-34620561-1",
            "CheckoutRequestID": "ws_CO_191220191020363925",
            "ResponseCode": "0",
            "ResponseDescription": "Success. Request accepted for processing",
            "CustomerMessage": "Success. Request accepted for processing"
        }"#;
        let res: StkPushResponse = serde_json::from_str(json).unwrap();
        assert!(res.is_accepted());
        assert_eq!(res.checkout_request_id, "ws_CO_191220191020363925");
    }

    #[test]
    fn query_response_with_string_result_code() {
        let json = r#"{
            "ResponseCode": "0",
            "ResponseDescription": "The service request has been accepted successsfully",
            "MerchantRequestID": "22205-34066-1",
            "CheckoutRequestID": "ws_CO_13012021093521236557",
            "ResultCode": "1032",
            "ResultDesc": "Request cancelled by user"
        }"#;
        let res: StkQueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(res.result_code, 1032);
        assert!(res.mpesa_receipt_number.is_none());
    }

    #[test]
    fn access_token() {
        let token: AccessToken =
            serde_json::from_str(r#"{"access_token":"c9SQxWWhmdVRlyh0zh8gZDTkubVF","expires_in":"3599"}"#).unwrap();
        assert_eq!(token.expires_in, 3599);
        let now = Utc::now();
        assert_eq!(token.expires_at(now), now + Duration::seconds(3599));
    }
}
