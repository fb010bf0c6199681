pub mod registry_macro;
