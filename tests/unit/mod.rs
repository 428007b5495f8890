pub mod provider_files;
