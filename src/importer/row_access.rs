// ==========================================
// 表格行导入管道 - 行访问器
// ==========================================
// 职责: 按候选名称列表从一行中解析字段值
// 顺序: 对每个候选名，先映射式访问（键名/下标），再属性式访问
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::value::Value;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ==========================================
// RowAccess Trait
// ==========================================
// 用途: 行的读取能力集合
// 实现者: HashMap/BTreeMap（键名）、Vec<Value>（下标）、
//         serde_json::Value（键名/下标）、ObjectRow（属性）、SheetRow（表头/列号）
pub trait RowAccess {
    /// 映射式访问（键名或下标），不存在时返回 None
    fn lookup_key(&self, _name: &str) -> Option<Value> {
        None
    }

    /// 属性式访问，不存在时返回 None
    fn lookup_attribute(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// 按声明顺序尝试候选名称，返回首个命中的值
///
/// # 返回
/// - (value, true): 某个候选名命中
/// - (Value::Null, false): 全部未命中（本身不是错误）
pub fn resolve<R: RowAccess + ?Sized>(row: &R, names: &[String]) -> (Value, bool) {
    for name in names {
        if let Some(value) = row
            .lookup_key(name)
            .or_else(|| row.lookup_attribute(name))
        {
            return (value, true);
        }
    }
    (Value::Null, false)
}

impl<T: RowAccess + ?Sized> RowAccess for &T {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        (**self).lookup_key(name)
    }

    fn lookup_attribute(&self, name: &str) -> Option<Value> {
        (**self).lookup_attribute(name)
    }
}

impl<T: RowAccess + ?Sized> RowAccess for Box<T> {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        (**self).lookup_key(name)
    }

    fn lookup_attribute(&self, name: &str) -> Option<Value> {
        (**self).lookup_attribute(name)
    }
}

impl<V: Clone + Into<Value>> RowAccess for HashMap<String, V> {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Into::into)
    }
}

impl<V: Clone + Into<Value>> RowAccess for BTreeMap<String, V> {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        self.get(name).cloned().map(Into::into)
    }
}

// 下标式访问: 候选名需为十进制下标
impl RowAccess for [Value] {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        let index: usize = name.trim().parse().ok()?;
        self.get(index).cloned()
    }
}

impl RowAccess for Vec<Value> {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        self.as_slice().lookup_key(name)
    }
}

impl RowAccess for serde_json::Value {
    fn lookup_key(&self, name: &str) -> Option<Value> {
        match self {
            serde_json::Value::Object(map) => map.get(name).cloned().map(Value::from),
            serde_json::Value::Array(items) => {
                let index: usize = name.trim().parse().ok()?;
                items.get(index).cloned().map(Value::from)
            }
            _ => None,
        }
    }
}

// ==========================================
// ObjectRow - 属性式行
// ==========================================
// 将任意可序列化结构体的字段暴露为属性
#[derive(Debug, Clone)]
pub struct ObjectRow {
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl ObjectRow {
    pub fn new<T: Serialize>(object: &T) -> ImportResult<Self> {
        match serde_json::to_value(object) {
            Ok(serde_json::Value::Object(attributes)) => Ok(Self { attributes }),
            Ok(other) => Err(ImportError::Other(anyhow::anyhow!(
                "ObjectRow 需要结构体或映射，实际为: {}",
                other
            ))),
            Err(e) => Err(ImportError::Other(e.into())),
        }
    }
}

impl RowAccess for ObjectRow {
    fn lookup_attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned().map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_alias_precedence() {
        let mut row = HashMap::new();
        row.insert("name".to_string(), "Ann".to_string());
        row.insert("full_name".to_string(), "Ann Lee".to_string());

        let (value, found) = resolve(&row, &names(&["name", "full_name"]));
        assert!(found);
        assert_eq!(value, Value::from("Ann"));

        let (value, found) = resolve(&row, &names(&["full_name", "name"]));
        assert!(found);
        assert_eq!(value, Value::from("Ann Lee"));
    }

    #[test]
    fn test_resolve_falls_through_to_later_alias() {
        let mut row = HashMap::new();
        row.insert("full_name".to_string(), Value::from("Cid"));

        let (value, found) = resolve(&row, &names(&["name", "full_name"]));
        assert!(found);
        assert_eq!(value, Value::from("Cid"));
    }

    #[test]
    fn test_resolve_not_found_is_null() {
        let row: HashMap<String, String> = HashMap::new();
        let (value, found) = resolve(&row, &names(&["id"]));
        assert!(!found);
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_present_empty_value_counts_as_found() {
        let mut row = HashMap::new();
        row.insert("id".to_string(), String::new());
        let (value, found) = resolve(&row, &names(&["id"]));
        assert!(found);
        assert_eq!(value, Value::from(""));
    }

    #[test]
    fn test_index_access() {
        let row = vec![Value::from("a"), Value::Int(2)];
        assert_eq!(resolve(&row, &names(&["1"])), (Value::Int(2), true));
        assert_eq!(resolve(&row, &names(&["5", "0"])), (Value::from("a"), true));
        assert_eq!(resolve(&row, &names(&["name"])), (Value::Null, false));
    }

    #[test]
    fn test_json_row() {
        let row = serde_json::json!({"id": 7, "tags": ["x"]});
        assert_eq!(resolve(&row, &names(&["id"])), (Value::Int(7), true));

        let row = serde_json::json!(["a", "b"]);
        assert_eq!(resolve(&row, &names(&["1"])), (Value::from("b"), true));
    }

    #[derive(Serialize)]
    struct Person {
        name: String,
        age: i64,
    }

    #[test]
    fn test_object_row_attribute_access() {
        let row = ObjectRow::new(&Person {
            name: "Bob".to_string(),
            age: 40,
        })
        .unwrap();

        assert_eq!(row.lookup_key("name"), None);
        assert_eq!(resolve(&row, &names(&["age"])), (Value::Int(40), true));
        assert_eq!(resolve(&row, &names(&["nick", "name"])), (Value::from("Bob"), true));
    }

    #[test]
    fn test_object_row_rejects_scalars() {
        assert!(ObjectRow::new(&5).is_err());
    }

    struct KeyAndAttr;

    impl RowAccess for KeyAndAttr {
        fn lookup_key(&self, name: &str) -> Option<Value> {
            (name == "a").then(|| Value::from("key"))
        }

        fn lookup_attribute(&self, name: &str) -> Option<Value> {
            (name == "a" || name == "b").then(|| Value::from("attr"))
        }
    }

    #[test]
    fn test_key_lookup_before_attribute_lookup() {
        assert_eq!(resolve(&KeyAndAttr, &names(&["a"])), (Value::from("key"), true));
        assert_eq!(resolve(&KeyAndAttr, &names(&["b"])), (Value::from("attr"), true));
    }
}
