mod bulk;
mod tree;

#[ctor::ctor]
fn init() {
    colog::init();
}
