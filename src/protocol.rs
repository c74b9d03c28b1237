// Wire contracts for the post/auth backend: the remote function names and
// the request/response payloads each of them accepts or returns. Field
// names mirror the backend, which expects PascalCase keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote functions the client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteFunction {
    GetPosts,
    SignIn,
    StartRegister,
    FinishRegister,
    StartReset,
    FinishReset,
    AddPost,
    DeletePost,
    DeleteAccount,
}

impl RemoteFunction {
    /// Identifier the backend deploys the function under.
    pub fn name(self) -> &'static str {
        match self {
            RemoteFunction::GetPosts => "GetPosts",
            RemoteFunction::SignIn => "SignInCognitoUser",
            RemoteFunction::StartRegister => "StartAddingPendingCognitoUser",
            RemoteFunction::FinishRegister => "FinishAddingPendingCognitoUser",
            RemoteFunction::StartReset => "StartChangingForgottenCognitoUserPassword",
            RemoteFunction::FinishReset => "FinishChangingForgottenCognitoUserPassword",
            RemoteFunction::AddPost => "AddPost",
            RemoteFunction::DeletePost => "DeletePost",
            RemoteFunction::DeleteAccount => "DeleteCognitoUser",
        }
    }
}

impl fmt::Display for RemoteFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request for the latest posts.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct GetPostsRequest {
    pub sort_by: String,
    pub sort_order: String,
    pub posts_to_get: u32,
}

impl GetPostsRequest {
    /// Newest-first request for at most `limit` posts.
    pub fn newest(limit: u32) -> Self {
        GetPostsRequest {
            sort_by: "timestamp".into(),
            sort_order: "descending".into(),
            posts_to_get: limit,
        }
    }
}

/// Sign-in credentials. Also the shape `Debug` output must never leak.
#[derive(Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Credential {
    pub user_name: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StartRegisterRequest {
    pub user_name: String,
    pub password: String,
    pub email: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FinishRegisterRequest {
    pub user_name: String,
    pub confirmation_code: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StartResetRequest {
    pub user_name: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FinishResetRequest {
    pub user_name: String,
    pub confirmation_code: String,
    pub new_password: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AddPostRequest {
    pub access_token: String,
    pub message: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DeletePostRequest {
    pub access_token: String,
    pub timestamp_of_post: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteAccountRequest {
    pub access_token: String,
}

/// String attribute as the post store returns it: `{"S": "..."}`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StringAttribute {
    #[serde(rename = "S", default)]
    pub s: String,
}

/// One post record in `GetPosts` data.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PostRecord {
    pub alias: StringAttribute,
    pub timestamp: StringAttribute,
    pub message: StringAttribute,
}

/// Tokens issued on a successful sign-in.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthenticationResult {
    pub access_token: String,
    pub expires_in: i64,
    pub token_type: String,
    pub refresh_token: String,
    pub id_token: String,
}

/// `SignInCognitoUser` data.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct SignInData {
    pub authentication_result: AuthenticationResult,
}

/// `StartAddingPendingCognitoUser` data.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct StartRegisterData {
    pub user_confirmed: bool,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct CodeDeliveryDetails {
    pub destination: String,
    pub delivery_mechanism: String,
    pub attribute_name: String,
}

/// `StartChangingForgottenCognitoUserPassword` data.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct StartResetData {
    pub code_delivery_details: CodeDeliveryDetails,
}

/// `FinishChangingForgottenCognitoUserPassword` data. The token set is
/// optional on the wire; the orchestrator insists on it.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct FinishResetData {
    pub authentication_result: Option<AuthenticationResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn requests_use_backend_field_names() {
        let req = FinishResetRequest {
            user_name: "doug".into(),
            confirmation_code: "123456".into(),
            new_password: "hunter22".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"UserName": "doug", "ConfirmationCode": "123456", "NewPassword": "hunter22"})
        );

        assert_eq!(
            serde_json::to_value(GetPostsRequest::newest(20)).unwrap(),
            json!({"SortBy": "timestamp", "SortOrder": "descending", "PostsToGet": 20})
        );
    }

    #[rstest]
    fn credential_debug_redacts_password() {
        let cred = Credential {
            user_name: "doug".into(),
            password: "secret".into(),
        };
        let shown = format!("{cred:?}");
        assert!(shown.contains("doug"));
        assert!(!shown.contains("secret"));
    }

    #[rstest]
    fn post_record_reads_attribute_values() {
        let record: PostRecord = serde_json::from_value(json!({
            "Alias": {"S": "doug"},
            "Timestamp": {"S": "1500000000"},
            "Message": {"S": "Where is the meeting today?"}
        }))
        .unwrap();

        assert_eq!(record.alias.s, "doug");
        assert_eq!(record.timestamp.s, "1500000000");
        assert_eq!(record.message.s, "Where is the meeting today?");
    }

    #[rstest]
    #[case(RemoteFunction::SignIn, "SignInCognitoUser")]
    #[case(RemoteFunction::DeleteAccount, "DeleteCognitoUser")]
    #[case(RemoteFunction::FinishRegister, "FinishAddingPendingCognitoUser")]
    fn function_names_match_deployment(#[case] function: RemoteFunction, #[case] name: &str) {
        assert_eq!(function.name(), name);
        assert_eq!(function.to_string(), name);
    }
}
