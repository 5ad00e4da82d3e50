mod constraints;
mod dofs;
mod projection;
