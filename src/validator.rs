use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use genera_core::AppError;

/// Field messages joined in field order, so responses are stable.
fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut messages = Vec::new();
    for (field, field_errors) in fields {
        for error in field_errors {
            messages.push(match &error.message {
                Some(message) => message.to_string(),
                None => format!("{field} es inválido"),
            });
        }
    }
    messages.join(", ")
}

fn rejection_message(rejection: &JsonRejection) -> String {
    if let JsonRejection::MissingJsonContentType(_) = rejection {
        return "Falta el encabezado 'Content-Type: application/json'".to_string();
    }

    let detail = rejection.body_text();
    if let Some(rest) = detail.split("missing field `").nth(1) {
        let field = rest.split('`').next().unwrap_or("desconocido");
        return format!("El campo {field} es obligatorio");
    }
    if detail.contains("unknown variant") || detail.contains("invalid type") {
        return "Tipo o valor de campo inválido en la solicitud".to_string();
    }
    "Cuerpo de solicitud inválido".to_string()
}

/// JSON body extractor that runs `validator` rules: malformed bodies are
/// 400, rule violations 422.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            AppError::new(StatusCode::BAD_REQUEST, anyhow!(rejection_message(&rejection)))
        })?;

        if let Err(errors) = value.validate() {
            return Err(AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                anyhow!(validation_message(&errors)),
            ));
        }
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::ValidationError;

    #[test]
    fn test_validation_message_orders_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("name", ValidationError::new("length").with_message("Nombre inválido".into()));
        errors.add("email", ValidationError::new("email"));

        assert_eq!(validation_message(&errors), "email es inválido, Nombre inválido");
    }
}
