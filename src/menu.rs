//! Menu catalog.
//!
//! Catalog items are owned by the `menu` collection. Carts and orders hold
//! frozen copies of name/price, so edits here never rewrite anything already
//! placed.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    assets::AssetStore,
    database::{DocumentStore, MENU},
    error::AppError,
    utils::ImageUpload,
};

const NOT_FOUND: AppError = AppError::NotFound("Menu item not found.");

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Entree,
    Side,
    Drink,
    Dessert,
    Special,
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "Entree" => Ok(Category::Entree),
            "Side" => Ok(Category::Side),
            "Drink" => Ok(Category::Drink),
            "Dessert" => Ok(Category::Dessert),
            "Special" => Ok(Category::Special),
            other => Err(AppError::Validation(format!("Invalid category: {other}"))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: Category,
    pub image_path: Option<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields as they arrive from the admin multipart form. Everything optional,
/// `create` checks the required subset, `update` applies whatever is present.
#[derive(Default)]
pub struct MenuItemForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<Category>,
    pub available: Option<bool>,
}

pub async fn list(
    store: &dyn DocumentStore,
    available_only: bool,
) -> Result<Vec<MenuItem>, AppError> {
    let mut items = store
        .all(MENU)
        .await?
        .iter()
        .map(|document| serde_json::from_str(document))
        .collect::<Result<Vec<MenuItem>, _>>()?;

    if available_only {
        items.retain(|item| item.available);
    }

    // Stable browse order: category, then name.
    items.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));

    Ok(items)
}

pub async fn get(store: &dyn DocumentStore, id: u64) -> Result<MenuItem, AppError> {
    let document = store.get(MENU, &id.to_string()).await?.ok_or(NOT_FOUND)?;

    Ok(serde_json::from_str(&document)?)
}

pub async fn create(
    store: &dyn DocumentStore,
    assets: &AssetStore,
    form: MenuItemForm,
    image: Option<ImageUpload>,
) -> Result<MenuItem, AppError> {
    let name = required_text(form.name, "name")?;
    let description = required_text(form.description, "description")?;
    let price = non_negative(
        form.price
            .ok_or_else(|| AppError::Validation("Field price is required".to_string()))?,
    )?;
    let category = form
        .category
        .ok_or_else(|| AppError::Validation("Field category is required".to_string()))?;

    // Allocate the id before the asset write so that once a file exists on
    // disk, the only remaining fallible step is the record insert.
    let id = store.next_id(MENU).await?;

    let image_path = match &image {
        Some(upload) => Some(assets.save("imageFile", &upload.file_name, &upload.bytes).await?),
        None => None,
    };

    let now = Utc::now();
    let item = MenuItem {
        id,
        name,
        description,
        price,
        category,
        image_path: image_path.clone(),
        available: form.available.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };

    if let Err(err) = persist(store, &item, true).await {
        // The asset was written before the record, delete it again rather
        // than leave an orphaned file behind a failed create.
        rollback_asset(assets, image_path.as_deref()).await;
        return Err(err);
    }

    Ok(item)
}

pub async fn update(
    store: &dyn DocumentStore,
    assets: &AssetStore,
    id: u64,
    form: MenuItemForm,
    image: Option<ImageUpload>,
) -> Result<MenuItem, AppError> {
    // Nothing has touched disk yet, so an unknown id costs no cleanup.
    let mut item = get(store, id).await?;

    if let Some(name) = form.name {
        item.name = name;
    }
    if let Some(description) = form.description {
        item.description = description;
    }
    if let Some(price) = form.price {
        item.price = non_negative(price)?;
    }
    if let Some(category) = form.category {
        item.category = category;
    }
    if let Some(available) = form.available {
        item.available = available;
    }

    let previous_image = item.image_path.clone();
    let new_image = match &image {
        Some(upload) => Some(assets.save("imageFile", &upload.file_name, &upload.bytes).await?),
        None => None,
    };
    if let Some(reference) = &new_image {
        item.image_path = Some(reference.clone());
    }

    item.updated_at = Utc::now();

    if let Err(err) = persist(store, &item, false).await {
        rollback_asset(assets, new_image.as_deref()).await;
        return Err(err);
    }

    // New image committed, the replaced one goes away.
    if let (Some(_), Some(old)) = (&new_image, &previous_image) {
        if let Err(err) = assets.delete(old).await {
            warn!("Failed to delete replaced image {old}: {err}");
        }
    }

    Ok(item)
}

pub async fn delete(
    store: &dyn DocumentStore,
    assets: &AssetStore,
    id: u64,
) -> Result<(), AppError> {
    let item = get(store, id).await?;

    if !store.remove(MENU, &id.to_string()).await? {
        return Err(NOT_FOUND);
    }

    if let Some(reference) = &item.image_path {
        if let Err(err) = assets.delete(reference).await {
            warn!("Failed to delete image for removed item {id}: {err}");
        }
    }

    Ok(())
}

async fn persist(
    store: &dyn DocumentStore,
    item: &MenuItem,
    fresh: bool,
) -> Result<(), AppError> {
    let document = serde_json::to_string(item)?;
    let key = item.id.to_string();

    if fresh {
        if !store.insert(MENU, &key, document).await? {
            return Err(AppError::Conflict(format!("Menu item {key} already exists")));
        }
        Ok(())
    } else {
        store.put(MENU, &key, document).await
    }
}

async fn rollback_asset(assets: &AssetStore, reference: Option<&str>) {
    if let Some(reference) = reference {
        if let Err(err) = assets.delete(reference).await {
            warn!("Failed to delete failed upload {reference}: {err}");
        }
    }
}

fn non_negative(price: f64) -> Result<f64, AppError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(AppError::Validation("Price must be a non-negative number".to_string()))
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AppError::Validation(format!("Field {field} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    async fn temp_assets() -> (AssetStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetStore::open(dir.path().to_str().unwrap()).await.unwrap();
        (assets, dir)
    }

    fn form(name: &str, category: Category) -> MenuItemForm {
        MenuItemForm {
            name: Some(name.to_string()),
            description: Some("test item".to_string()),
            price: Some(6.5),
            category: Some(category),
            available: None,
        }
    }

    #[test]
    fn category_parses_the_closed_set_only() {
        assert_eq!("Entree".parse::<Category>().unwrap(), Category::Entree);
        assert_eq!("Special".parse::<Category>().unwrap(), Category::Special);
        assert!("Burger".parse::<Category>().is_err());
        assert!("entree".parse::<Category>().is_err());
    }

    #[tokio::test]
    async fn create_requires_all_mandatory_fields() {
        let store = MemoryStore::new();
        let (assets, _dir) = temp_assets().await;

        let missing_name = MenuItemForm {
            name: None,
            ..form("x", Category::Side)
        };
        assert!(create(&store, &assets, missing_name, None).await.is_err());

        // Nothing may have been persisted by the failed create.
        assert!(list(&store, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_is_partial() {
        let store = MemoryStore::new();
        let (assets, _dir) = temp_assets().await;
        let item = create(&store, &assets, form("Fries", Category::Side), None)
            .await
            .unwrap();

        let only_price = MenuItemForm {
            price: Some(3.25),
            ..MenuItemForm::default()
        };
        let updated = update(&store, &assets, item.id, only_price, None).await.unwrap();

        assert_eq!(updated.price, 3.25);
        assert_eq!(updated.name, "Fries");
        assert_eq!(updated.category, Category::Side);
        assert!(updated.available);
    }

    #[tokio::test]
    async fn list_sorts_by_category_then_name() {
        let store = MemoryStore::new();
        let (assets, _dir) = temp_assets().await;

        for (name, category) in [
            ("Soda", Category::Drink),
            ("Burger", Category::Entree),
            ("Apple Pie", Category::Dessert),
            ("Alfredo", Category::Entree),
        ] {
            create(&store, &assets, form(name, category), None).await.unwrap();
        }

        let names: Vec<String> = list(&store, false)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.name)
            .collect();

        assert_eq!(names, ["Alfredo", "Burger", "Soda", "Apple Pie"]);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found() {
        let store = MemoryStore::new();
        let (assets, _dir) = temp_assets().await;

        assert!(matches!(get(&store, 42).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            delete(&store, &assets, 42).await,
            Err(AppError::NotFound(_))
        ));
    }
}
