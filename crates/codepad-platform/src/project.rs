use serde::{Deserialize, Serialize};

/// Name given to the folder that wraps a template's top-level items.
pub const ROOT_FOLDER_NAME: &str = "Root";

/// A file as it is persisted: `{filename, fileExtension, content}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFile {
    pub filename: String,
    #[serde(default)]
    pub file_extension: String,
    #[serde(default)]
    pub content: String,
}

/// A folder as it is persisted: `{folderName, items[]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateFolder {
    pub folder_name: String,
    #[serde(default)]
    pub items: Vec<TemplateItem>,
}

/// One entry of a folder. The two shapes are told apart by their fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateItem {
    Folder(TemplateFolder),
    File(TemplateFile),
}

/// Items returned by a template loader, before being wrapped into a root folder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateItems {
    #[serde(default)]
    pub items: Vec<TemplateItem>,
}

impl TemplateItems {
    /// Wrap the items into the root folder of a project tree
    pub fn into_root(self) -> TemplateFolder {
        TemplateFolder {
            folder_name: ROOT_FOLDER_NAME.to_string(),
            items: self.items,
        }
    }
}

/// A project as returned by the persistent store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Template used to seed the project when it has no saved tree yet
    #[serde(default)]
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TemplateFolder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_tree() {
        let json = r#"{
            "folderName": "Root",
            "items": [
                {"filename": "index", "fileExtension": "ts", "content": "x"},
                {"folderName": "src", "items": [
                    {"filename": "README", "fileExtension": "", "content": ""}
                ]}
            ]
        }"#;

        let root: TemplateFolder = serde_json::from_str(json).unwrap();
        assert_eq!(root.folder_name, "Root");
        assert_eq!(root.items.len(), 2);
        assert!(matches!(&root.items[0], TemplateItem::File(f) if f.filename == "index"));
        match &root.items[1] {
            TemplateItem::Folder(src) => {
                assert_eq!(src.folder_name, "src");
                assert!(matches!(&src.items[0], TemplateItem::File(f) if f.file_extension.is_empty()));
            }
            other => panic!("expected folder, got {:?}", other),
        }
    }

    #[test]
    fn test_serializes_camel_case_fields() {
        let file = TemplateItem::File(TemplateFile {
            filename: "main".to_string(),
            file_extension: "rs".to_string(),
            content: String::new(),
        });
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["fileExtension"], "rs");
        assert!(value.get("folderName").is_none());
    }

    #[test]
    fn test_template_items_wrap_into_root() {
        let items: TemplateItems =
            serde_json::from_str(r#"{"items": [{"folderName": "public"}]}"#).unwrap();
        let root = items.into_root();
        assert_eq!(root.folder_name, ROOT_FOLDER_NAME);
        assert!(matches!(&root.items[0], TemplateItem::Folder(f) if f.items.is_empty()));
    }

    #[test]
    fn test_record_without_tree() {
        let record: ProjectRecord =
            serde_json::from_str(r#"{"id": "p1", "title": "Demo", "template": "react"}"#).unwrap();
        assert_eq!(record.template, "react");
        assert!(record.tree.is_none());
        let back = serde_json::to_value(&record).unwrap();
        assert!(back.get("tree").is_none());
    }
}
