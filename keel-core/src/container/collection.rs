/// Collection shapes understood by `get_many_into` and `get_collection`.
///
/// Elements are appended in registration order; `Option` keeps the last.
pub trait ServiceCollection: Default + 'static {
    type Element: 'static;

    fn add(&mut self, element: Self::Element);
}

impl<T: 'static> ServiceCollection for Vec<T> {
    type Element = T;

    fn add(&mut self, element: T) {
        self.push(element);
    }
}

impl<T: 'static> ServiceCollection for Option<T> {
    type Element = T;

    fn add(&mut self, element: T) {
        *self = Some(element);
    }
}
