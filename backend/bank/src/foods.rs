use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub categories: Vec<Category>,
    pub guides: BTreeMap<String, BTreeMap<String, TestGuide>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    pub description: String,
    pub common_adulterants: Vec<String>,
    pub test_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestGuide {
    pub name: String,
    pub description: String,
    pub duration: String,
    pub difficulty: String,
    pub steps: Vec<Step>,
    pub tips: Vec<String>,
    pub adulterants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    pub description: String,
}

impl Bank {
    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
    }

    pub fn item(&self, category_id: &str, item_id: &str) -> Option<&Item> {
        self.category(category_id)?
            .items
            .iter()
            .find(|item| item.id == item_id)
    }

    pub fn guide(&self, category_id: &str, item_id: &str) -> Option<&TestGuide> {
        self.guides.get(category_id)?.get(item_id)
    }
}
