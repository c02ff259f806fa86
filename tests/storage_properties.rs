//! Storage and service properties, checked against the in-memory adapter.

use crudkit::record::{read_identifier, write_typed_identifier, Document};
use crudkit::storage::{Pagination, SortSpec};
use crudkit::{CrudError, CrudService, Field, Hooks, ListQuery, MemoryStorage, Record, RecordSchema, Storage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Book {
    id: i64,
    title: String,
    pages: i64,
    in_print: bool,
}

impl Hooks for Book {}

impl Record for Book {
    const NAME: &'static str = "Book";
    fn fields() -> Vec<Field> {
        vec![
            Field::integer("id"),
            Field::text("title"),
            Field::integer("pages"),
            Field::boolean("in_print"),
        ]
    }
}

async fn service() -> CrudService<Book> {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    storage.apply_schema(&[RecordSchema::of::<Book>()]).await.unwrap();
    CrudService::new(storage).unwrap()
}

fn book(title: &str, pages: i64) -> Book {
    Book {
        id: 0,
        title: title.into(),
        pages,
        in_print: true,
    }
}

#[tokio::test]
async fn create_then_find_returns_equal_record() {
    let svc = service().await;
    for (title, pages) in [("Dune", 412), ("Emma", 474), ("Ulysses", 730)] {
        let created = svc.create(book(title, pages)).await.unwrap();
        assert_ne!(created.id, 0);
        let found = svc.get(&read_identifier(&created).unwrap()).await.unwrap();
        assert_eq!(found, created);
    }
}

#[tokio::test]
async fn delete_then_find_is_not_found() {
    let svc = service().await;
    let created = svc.create(book("Dune", 412)).await.unwrap();
    let id = created.id.to_string();
    svc.delete(&id).await.unwrap();
    assert!(matches!(svc.get(&id).await, Err(CrudError::NotFound(_))));
    assert!(matches!(svc.delete(&id).await, Err(CrudError::NotFound(_))));
}

#[tokio::test]
async fn single_row_pages_reproduce_the_full_listing() {
    let svc = service().await;
    for (title, pages) in [("b", 300), ("a", 100), ("c", 100), ("d", 200), ("e", 100)] {
        svc.create(book(title, pages)).await.unwrap();
    }

    for sort in [vec![], vec![SortSpec::asc("pages")], vec![SortSpec::desc("pages"), SortSpec::asc("title")]] {
        let full = svc
            .list(&ListQuery {
                sort: sort.clone(),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(full.len(), 5);

        let mut paged = Vec::new();
        for offset in 0..(full.len() as i64 + 2) {
            let page = svc
                .list(&ListQuery {
                    sort: sort.clone(),
                    pagination: Pagination::new(1, offset),
                    ..ListQuery::default()
                })
                .await
                .unwrap();
            assert!(page.len() <= 1);
            paged.extend(page);
        }
        assert_eq!(paged, full);
    }
}

#[tokio::test]
async fn filters_are_exact_match() {
    let svc = service().await;
    svc.create(book("a", 100)).await.unwrap();
    svc.create(book("b", 200)).await.unwrap();
    let mut out_of_print = book("c", 100);
    out_of_print.in_print = false;
    svc.create(out_of_print).await.unwrap();

    let mut query = ListQuery::default();
    query.filters.insert("pages".into(), json!(100));
    query.filters.insert("in_print".into(), json!(true));
    let found = svc.list(&query).await.unwrap();
    assert_eq!(found.iter().map(|b| b.title.as_str()).collect::<Vec<_>>(), vec!["a"]);
}

#[tokio::test]
async fn applying_a_patch_twice_equals_applying_it_once() {
    let svc = service().await;
    let created = svc.create(book("Dune", 412)).await.unwrap();
    let id = created.id.to_string();

    let patch: Document = json!({"title": "Dune Messiah", "pages": 256, "unknown": 1})
        .as_object()
        .cloned()
        .unwrap();
    let once = svc.patch(&id, &patch).await.unwrap();
    let twice = svc.patch(&id, &patch).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.title, "Dune Messiah");
    assert_eq!(once.pages, 256);
    assert!(once.in_print);
    assert_eq!(once.id, created.id);
}

#[tokio::test]
async fn typed_identifiers() {
    let schema = RecordSchema::of::<Book>();
    assert_eq!(
        write_typed_identifier("42", &schema).unwrap(),
        crudkit::IdValue::Integer(42)
    );
    assert!(matches!(
        write_typed_identifier("abc", &schema),
        Err(CrudError::Conversion(_))
    ));

    let svc = service().await;
    assert!(matches!(svc.get("abc").await, Err(CrudError::Conversion(_))));
}
