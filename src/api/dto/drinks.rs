/*
 * Responsibility
 * - Drinks の request/response DTO
 * - short (公開): recipe は color/parts のみ (材料名は隠す)
 * - long (要 permission): recipe をそのまま返す
 */
use serde::{Deserialize, Serialize};

use crate::repos::{Drink, Ingredient};

/// Frontend は recipe を配列で送るが、単体の ingredient も受け付ける
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecipeInput {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl RecipeInput {
    pub fn into_vec(self) -> Vec<Ingredient> {
        match self {
            RecipeInput::Many(items) => items,
            RecipeInput::One(item) => vec![item],
        }
    }
}

fn validate_recipe(recipe: &[Ingredient]) -> Result<(), &'static str> {
    if recipe.is_empty() {
        return Err("recipe must contain at least one ingredient");
    }
    if recipe
        .iter()
        .any(|i| i.name.trim().is_empty() || i.color.trim().is_empty())
    {
        return Err("ingredient name and color are required");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateDrinkRequest {
    pub title: Option<String>,
    pub recipe: Option<RecipeInput>,
}

impl CreateDrinkRequest {
    pub fn validate(self) -> Result<(String, Vec<Ingredient>), &'static str> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or("title is required")?;
        let recipe = self.recipe.ok_or("recipe is required")?.into_vec();
        validate_recipe(&recipe)?;

        Ok((title, recipe))
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateDrinkRequest {
    pub title: Option<String>,
    pub recipe: Option<RecipeInput>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum UpdateRejection {
    // Nothing to update (400)
    Empty,
    // A field is present but unusable (422)
    Invalid(&'static str),
}

impl UpdateDrinkRequest {
    pub fn validate(self) -> Result<(Option<String>, Option<Vec<Ingredient>>), UpdateRejection> {
        if self.title.is_none() && self.recipe.is_none() {
            return Err(UpdateRejection::Empty);
        }
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(UpdateRejection::Invalid("title cannot be empty"));
        }
        let recipe = self.recipe.map(RecipeInput::into_vec);
        if let Some(recipe) = &recipe {
            validate_recipe(recipe).map_err(UpdateRejection::Invalid)?;
        }

        Ok((self.title, recipe))
    }
}

#[derive(Debug, Serialize)]
pub struct IngredientShort {
    pub color: String,
    pub parts: u32,
}

#[derive(Debug, Serialize)]
pub struct DrinkShort {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<IngredientShort>,
}

impl From<Drink> for DrinkShort {
    fn from(d: Drink) -> Self {
        Self {
            id: d.id,
            title: d.title,
            recipe: d
                .recipe
                .into_iter()
                .map(|i| IngredientShort {
                    color: i.color,
                    parts: i.parts,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrinkLong {
    pub id: i32,
    pub title: String,
    pub recipe: Vec<Ingredient>,
}

impl From<Drink> for DrinkLong {
    fn from(d: Drink) -> Self {
        Self {
            id: d.id,
            title: d.title,
            recipe: d.recipe,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrinksResponse<T> {
    pub success: bool,
    pub drinks: Vec<T>,
}

impl<T> DrinksResponse<T> {
    pub fn new(drinks: Vec<T>) -> Self {
        Self {
            success: true,
            drinks,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub delete: i32,
}
