pub mod walk;

pub use walk::TreeWalker;
