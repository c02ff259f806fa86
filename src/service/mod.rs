//! CrudService: typed CRUD over the storage port, with lifecycle hooks.

mod crud;
pub use crud::CrudService;
