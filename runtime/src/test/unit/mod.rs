mod image;
mod kernel;
