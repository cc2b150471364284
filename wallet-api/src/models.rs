use serde::{Deserialize, Serialize};

/// Deposit verification request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
pub struct VerifyDepositRequest {
    #[validate(length(min = 1))]
    pub reference: String,
    #[validate(length(min = 1))]
    pub uid: String,
}

/// Task approval request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApproveTaskRequest {
    #[validate(length(min = 1))]
    pub submission_id: String,
}

/// Withdrawal processing and reconciliation request
#[derive(Debug, Deserialize, Serialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    #[validate(length(min = 1))]
    pub withdrawal_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn requests_parse_wire_field_names() {
        let request: ApproveTaskRequest =
            serde_json::from_str(r#"{"submissionId":"s1"}"#).unwrap();
        assert_eq!(request.submission_id, "s1");

        let request: WithdrawalRequest =
            serde_json::from_str(r#"{"withdrawalId":"w1"}"#).unwrap();
        assert_eq!(request.withdrawal_id, "w1");
    }

    #[test]
    fn empty_ids_fail_validation() {
        let request = VerifyDepositRequest {
            reference: String::new(),
            uid: "u1".to_string(),
        };
        assert!(request.validate().is_err());

        let request = WithdrawalRequest {
            withdrawal_id: String::new(),
        };
        assert!(request.validate().is_err());
    }
}
