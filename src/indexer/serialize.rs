//! Item serialization for the indexing job (§4.6 step 2): groups items by
//! their deepest container and renders each group into the
//! newline-separated chunk text that gets embedded.

use std::collections::BTreeMap;
use std::sync::Arc;

/// One node of nesting through item-containers (shulker-in-chest,
/// bundle-in-shulker). An empty path means "at root of the container".
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ContainerPathNode {
    #[serde(rename = "type")]
    pub kind: String,
    pub slot: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One item instance as reported by the (out-of-scope) game host.
#[derive(Debug, Clone)]
pub struct ItemStack {
    pub slot: i64,
    pub material_id: String,
    pub display_name: Option<String>,
    pub count: i64,
    pub container_path: Vec<ContainerPathNode>,
}

/// A pure, idempotent, host-agnostic function producing extra searchable
/// tags for an item (the "tag providers" extension hook).
pub type TagProvider = Arc<dyn Fn(&ItemStack) -> Vec<String> + Send + Sync>;

pub struct ChunkGroup {
    pub container_path: String,
    pub content_text: String,
}

/// Groups items by deepest container in `container_path` and renders one
/// chunk per group. Groups are ordered by path-preorder so repeated runs
/// against the same inventory assign stable `chunk_index` values.
pub fn group_into_chunks(items: &[ItemStack], tag_providers: &[TagProvider]) -> Vec<ChunkGroup> {
    let mut groups: BTreeMap<Vec<(i64, String)>, (String, Vec<String>)> = BTreeMap::new();

    for item in items {
        let key: Vec<(i64, String)> = item
            .container_path
            .iter()
            .map(|n| (n.slot, n.kind.clone()))
            .collect();
        let entry = groups
            .entry(key)
            .or_insert_with(|| (canonical_path(&item.container_path), Vec::new()));
        entry.1.push(render_item_line(item, tag_providers));
    }

    groups
        .into_values()
        .map(|(container_path, lines)| ChunkGroup {
            container_path,
            content_text: lines.join("\n"),
        })
        .collect()
}

fn canonical_path(path: &[ContainerPathNode]) -> String {
    serde_json::to_string(path).unwrap_or_else(|_| "[]".to_string())
}

fn render_item_line(item: &ItemStack, tag_providers: &[TagProvider]) -> String {
    let name = item.display_name.as_deref().unwrap_or(&item.material_id);
    let mut tags: Vec<String> = tag_providers.iter().flat_map(|p| p(item)).collect();
    tags.sort();
    tags.dedup();

    let mut line = format!(
        "{name} ({material}) x{count} @slot{slot}",
        name = name,
        material = item.material_id,
        count = item.count,
        slot = item.slot
    );
    if !tags.is_empty() {
        line.push_str(" [");
        line.push_str(&tags.join(", "));
        line.push(']');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(slot: i64, material: &str, path: Vec<ContainerPathNode>) -> ItemStack {
        ItemStack {
            slot,
            material_id: material.to_string(),
            display_name: None,
            count: 1,
            container_path: path,
        }
    }

    #[test]
    fn root_items_group_into_one_chunk() {
        let items = vec![
            item(0, "minecraft:diamond", Vec::new()),
            item(1, "minecraft:iron_ingot", Vec::new()),
        ];
        let groups = group_into_chunks(&items, &[]);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].content_text.contains("diamond"));
        assert!(groups[0].content_text.contains("iron_ingot"));
    }

    #[test]
    fn nested_shulker_items_get_own_chunk() {
        let shulker_path = vec![ContainerPathNode {
            kind: "shulker_box".to_string(),
            slot: 4,
            color: Some("purple".to_string()),
            name: None,
        }];
        let items = vec![
            item(0, "minecraft:diamond", Vec::new()),
            item(2, "minecraft:totem_of_undying", shulker_path),
        ];
        let groups = group_into_chunks(&items, &[]);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().any(|g| g.container_path == "[]"));
        assert!(groups.iter().any(|g| g.container_path.contains("shulker_box")));
    }

    #[test]
    fn tag_providers_append_to_line() {
        let provider: TagProvider = Arc::new(|item: &ItemStack| {
            if item.material_id.contains("diamond") {
                vec!["rare".to_string()]
            } else {
                Vec::new()
            }
        });
        let items = vec![item(0, "minecraft:diamond", Vec::new())];
        let groups = group_into_chunks(&items, &[provider]);
        assert!(groups[0].content_text.contains("[rare]"));
    }
}
