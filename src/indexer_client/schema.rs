use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    pub name: String,
    pub fields: Vec<FieldInfo>,
}

fn parse_field(line: &str) -> Option<FieldInfo> {
    let (left, right) = line.split_once(':')?;
    let start = left
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)?;
    let kind = right.trim_start();
    let kind = kind.split('!').next().unwrap_or_default().trim();
    if kind.is_empty() {
        return None;
    }
    Some(FieldInfo {
        name: left[start..].to_string(),
        kind: kind.to_string(),
    })
}

/// Extracts entity types and their scalar fields from a GraphQL schema file.
/// Only the flat `type X { name: Type! }` shape used by the indexer is read.
pub fn parse_schema_entities(schema: &str) -> Vec<EntityInfo> {
    let mut entities: Vec<EntityInfo> = vec![];
    let mut open = false;

    for line in schema.lines() {
        let line = line.trim();

        if line.starts_with("type ") && !line.contains('(') {
            let name = line.replacen("type ", "", 1).replacen(" {", "", 1);
            let name = name.trim();
            if !name.is_empty() {
                entities.push(EntityInfo {
                    name: name.to_string(),
                    fields: vec![],
                });
                open = true;
            }
        } else if open && line.contains(':') {
            if let (Some(field), Some(entity)) = (parse_field(line), entities.last_mut()) {
                entity.fields.push(field);
            }
        }

        if line == "}" {
            open = false;
        }
    }

    entities
}

pub fn counts_query(entities: &[EntityInfo]) -> String {
    let selections = entities
        .iter()
        .map(|entity| format!("    {} {{\n      id\n    }}", entity.name))
        .collect::<Vec<_>>()
        .join("\n");
    format!("query GetEventCounts {{\n{}\n  }}", selections)
}

pub fn recent_events_query(entities: &[EntityInfo], limit: usize) -> String {
    let selections = entities
        .iter()
        .map(|entity| {
            let fields = entity
                .fields
                .iter()
                .map(|field| format!("      {}", field.name))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "    {}(limit: {}, order_by: {{ id: desc }}) {{\n{}\n    }}",
                entity.name, limit, fields
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("query GetRecentEvents {{\n{}\n  }}", selections)
}

/// Single-collection query used by the indexer-first loaders.
pub fn collection_query(collection: &str, fields: &[&str], limit: Option<usize>) -> String {
    let args = match limit {
        Some(limit) => format!("(limit: {}, order_by: {{ id: desc }})", limit),
        None => "(order_by: { id: desc })".to_string(),
    };
    let fields = fields
        .iter()
        .map(|field| format!("      {}", field))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "query Get{} {{\n    {}{} {{\n{}\n    }}\n  }}",
        collection.replace('_', ""),
        collection,
        args,
        fields
    )
}
