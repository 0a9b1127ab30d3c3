//! Decoding of the admin menu multipart form.
//!
//! The form carries text fields (name, description, price, category,
//! available) plus an optional `imageFile` part. Everything is validated
//! here, before any domain logic runs; malformed input never gets past this
//! module.

use axum::{body::Bytes, extract::Multipart};

use crate::{
    error::AppError,
    menu::MenuItemForm,
};

pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Bytes,
}

pub async fn read_menu_form(
    mut multipart: Multipart,
) -> Result<(MenuItemForm, Option<ImageUpload>), AppError> {
    let mut form = MenuItemForm::default();
    let mut image = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "name" => form.name = Some(text(field).await?),
            "description" => form.description = Some(text(field).await?),
            "price" => {
                let raw = text(field).await?;
                form.price = Some(raw.trim().parse().map_err(|_| {
                    AppError::Validation(format!("Invalid price: {raw}"))
                })?);
            }
            "category" => form.category = Some(text(field).await?.parse()?),
            // The form posts booleans as strings, anything but "true" is off.
            "available" => form.available = Some(text(field).await? == "true"),
            "imageFile" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::Validation("Malformed image upload".to_string()))?;
                image = Some(ImageUpload { file_name, bytes });
            }
            _ => {}
        }
    }

    Ok((form, image))
}

async fn next_field(
    multipart: &mut Multipart,
) -> Result<Option<axum::extract::multipart::Field<'_>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|_| AppError::Validation("Malformed multipart payload".to_string()))
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|_| AppError::Validation("Malformed multipart payload".to_string()))
}
