use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductId;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

use crate::order::OrderId;

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Cart identifier. Every user owns exactly one cart stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub AggregateId);

impl CartId {
    pub fn for_user(user_id: UserId) -> Self {
        Self(AggregateId::derived("shop.cart", user_id.as_uuid().as_bytes()))
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Aggregate root: Cart.
///
/// A cart that has never seen an event is simply empty, so there is no
/// explicit create command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    owner: Option<UserId>,
    items: Vec<CartItem>,
    version: u64,
}

impl Cart {
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            owner: None,
            items: Vec::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    /// Items in the order they were first added.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.items
            .iter()
            .find(|i| i.product_id == product_id)
            .map(|i| i.quantity)
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItem (increments the quantity when the product is already in the cart).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetQuantity (0 removes the line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuantity {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CheckOutItems. Takes the purchased quantities out of the cart,
/// leaving anything added since the cart was priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutItems {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub order_id: OrderId,
    pub items: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    AddItem(AddItem),
    SetQuantity(SetQuantity),
    RemoveItem(RemoveItem),
    ClearCart(ClearCart),
    CheckOutItems(CheckOutItems),
}

impl CartCommand {
    fn target(&self) -> (CartId, UserId) {
        match self {
            CartCommand::AddItem(c) => (c.cart_id, c.user_id),
            CartCommand::SetQuantity(c) => (c.cart_id, c.user_id),
            CartCommand::RemoveItem(c) => (c.cart_id, c.user_id),
            CartCommand::ClearCart(c) => (c.cart_id, c.user_id),
            CartCommand::CheckOutItems(c) => (c.cart_id, c.user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitySet {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub cart_id: CartId,
    pub occurred_at: DateTime<Utc>,
}

/// `items` holds the quantities actually taken, never more than the cart had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsCheckedOut {
    pub cart_id: CartId,
    pub order_id: OrderId,
    pub items: Vec<CartItem>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    ItemAdded(ItemAdded),
    QuantitySet(QuantitySet),
    ItemRemoved(ItemRemoved),
    CartCleared(CartCleared),
    ItemsCheckedOut(ItemsCheckedOut),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::ItemAdded(_) => "shop.cart.item_added",
            CartEvent::QuantitySet(_) => "shop.cart.quantity_set",
            CartEvent::ItemRemoved(_) => "shop.cart.item_removed",
            CartEvent::CartCleared(_) => "shop.cart.cleared",
            CartEvent::ItemsCheckedOut(_) => "shop.cart.items_checked_out",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::ItemAdded(e) => e.occurred_at,
            CartEvent::QuantitySet(e) => e.occurred_at,
            CartEvent::ItemRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
            CartEvent::ItemsCheckedOut(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::ItemAdded(e) => {
                self.owner = Some(e.user_id);
                match self.items.iter_mut().find(|i| i.product_id == e.product_id) {
                    Some(item) => item.quantity += e.quantity,
                    None => self.items.push(CartItem {
                        product_id: e.product_id,
                        quantity: e.quantity,
                    }),
                }
            }
            CartEvent::QuantitySet(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.product_id == e.product_id) {
                    item.quantity = e.quantity;
                }
            }
            CartEvent::ItemRemoved(e) => {
                self.items.retain(|i| i.product_id != e.product_id);
            }
            CartEvent::CartCleared(_) => {
                self.items.clear();
            }
            CartEvent::ItemsCheckedOut(e) => {
                for taken in &e.items {
                    if let Some(item) = self.items.iter_mut().find(|i| i.product_id == taken.product_id) {
                        item.quantity = item.quantity.saturating_sub(taken.quantity);
                    }
                }
                self.items.retain(|i| i.quantity > 0);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        let (cart_id, user_id) = command.target();
        if cart_id != self.id {
            return Err(DomainError::invariant("cart_id mismatch"));
        }
        if self.owner.is_some_and(|owner| owner != user_id) {
            return Err(DomainError::Unauthorized);
        }

        match command {
            CartCommand::AddItem(cmd) => {
                if cmd.quantity == 0 {
                    return Err(DomainError::validation("quantity must be at least 1"));
                }
                let current = self.quantity_of(cmd.product_id).unwrap_or(0);
                if current.saturating_add(cmd.quantity) > MAX_LINE_QUANTITY {
                    return Err(DomainError::validation(format!(
                        "quantity per product must not exceed {MAX_LINE_QUANTITY}"
                    )));
                }
                Ok(vec![CartEvent::ItemAdded(ItemAdded {
                    cart_id: cmd.cart_id,
                    user_id: cmd.user_id,
                    product_id: cmd.product_id,
                    quantity: cmd.quantity,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CartCommand::SetQuantity(cmd) => {
                if self.quantity_of(cmd.product_id).is_none() {
                    return Err(DomainError::not_found());
                }
                if cmd.quantity == 0 {
                    return Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
                        cart_id: cmd.cart_id,
                        product_id: cmd.product_id,
                        occurred_at: cmd.occurred_at,
                    })]);
                }
                if cmd.quantity > MAX_LINE_QUANTITY {
                    return Err(DomainError::validation(format!(
                        "quantity per product must not exceed {MAX_LINE_QUANTITY}"
                    )));
                }
                Ok(vec![CartEvent::QuantitySet(QuantitySet {
                    cart_id: cmd.cart_id,
                    product_id: cmd.product_id,
                    quantity: cmd.quantity,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CartCommand::RemoveItem(cmd) => {
                if self.quantity_of(cmd.product_id).is_none() {
                    return Err(DomainError::not_found());
                }
                Ok(vec![CartEvent::ItemRemoved(ItemRemoved {
                    cart_id: cmd.cart_id,
                    product_id: cmd.product_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CartCommand::ClearCart(cmd) => {
                // Clearing an empty cart is a no-op.
                if self.items.is_empty() {
                    return Ok(vec![]);
                }
                Ok(vec![CartEvent::CartCleared(CartCleared {
                    cart_id: cmd.cart_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CartCommand::CheckOutItems(cmd) => {
                let items: Vec<CartItem> = cmd
                    .items
                    .iter()
                    .filter_map(|wanted| {
                        let held = self.quantity_of(wanted.product_id)?;
                        let quantity = held.min(wanted.quantity);
                        (quantity > 0).then_some(CartItem {
                            product_id: wanted.product_id,
                            quantity,
                        })
                    })
                    .collect();
                if items.is_empty() {
                    return Ok(vec![]);
                }
                Ok(vec![CartEvent::ItemsCheckedOut(ItemsCheckedOut {
                    cart_id: cmd.cart_id,
                    order_id: cmd.order_id,
                    items,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn product(slug: &str) -> ProductId {
        ProductId::for_slug(slug)
    }

    fn add(user: UserId, product_id: ProductId, quantity: u32) -> CartCommand {
        CartCommand::AddItem(AddItem {
            cart_id: CartId::for_user(user),
            user_id: user,
            product_id,
            quantity,
            occurred_at: Utc::now(),
        })
    }

    fn set(user: UserId, product_id: ProductId, quantity: u32) -> CartCommand {
        CartCommand::SetQuantity(SetQuantity {
            cart_id: CartId::for_user(user),
            user_id: user,
            product_id,
            quantity,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn adding_same_product_twice_merges_quantity() {
        let user = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(user));

        execute(&mut cart, &add(user, product("mug"), 2)).unwrap();
        execute(&mut cart, &add(user, product("tee"), 1)).unwrap();
        execute(&mut cart, &add(user, product("mug"), 3)).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.quantity_of(product("mug")), Some(5));
        assert_eq!(cart.items()[0].product_id, product("mug"));
        assert_eq!(cart.owner(), Some(user));
    }

    #[test]
    fn set_quantity_zero_removes_line() {
        let user = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(user));
        execute(&mut cart, &add(user, product("mug"), 2)).unwrap();

        let events = execute(&mut cart, &set(user, product("mug"), 0)).unwrap();

        assert!(matches!(events.as_slice(), [CartEvent::ItemRemoved(_)]));
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_on_missing_line_is_not_found() {
        let user = UserId::new();
        let cart = Cart::empty(CartId::for_user(user));
        let err = cart.handle(&set(user, product("mug"), 4)).unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn zero_and_oversized_quantities_are_rejected() {
        let user = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(user));

        assert!(matches!(
            cart.handle(&add(user, product("mug"), 0)),
            Err(DomainError::Validation(_))
        ));

        execute(&mut cart, &add(user, product("mug"), MAX_LINE_QUANTITY)).unwrap();
        assert!(matches!(
            cart.handle(&add(user, product("mug"), 1)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn clearing_an_empty_cart_emits_nothing() {
        let user = UserId::new();
        let cart = Cart::empty(CartId::for_user(user));
        let events = cart
            .handle(&CartCommand::ClearCart(ClearCart {
                cart_id: CartId::for_user(user),
                user_id: user,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    fn check_out(user: UserId, items: &[(ProductId, u32)]) -> CartCommand {
        CartCommand::CheckOutItems(CheckOutItems {
            cart_id: CartId::for_user(user),
            user_id: user,
            order_id: OrderId::generate(),
            items: items
                .iter()
                .map(|&(product_id, quantity)| CartItem { product_id, quantity })
                .collect(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn checking_out_keeps_items_added_after_pricing() {
        let user = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(user));
        execute(&mut cart, &add(user, product("mug"), 2)).unwrap();
        execute(&mut cart, &add(user, product("tee"), 1)).unwrap();
        // Priced at mug x2, tee x1; then more arrive before the order lands.
        execute(&mut cart, &add(user, product("mug"), 1)).unwrap();
        execute(&mut cart, &add(user, product("cap"), 4)).unwrap();

        execute(&mut cart, &check_out(user, &[(product("mug"), 2), (product("tee"), 1)])).unwrap();

        assert_eq!(cart.quantity_of(product("mug")), Some(1));
        assert_eq!(cart.quantity_of(product("tee")), None);
        assert_eq!(cart.quantity_of(product("cap")), Some(4));
    }

    #[test]
    fn checking_out_never_takes_more_than_the_cart_holds() {
        let user = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(user));
        execute(&mut cart, &add(user, product("mug"), 1)).unwrap();

        let events = execute(&mut cart, &check_out(user, &[(product("mug"), 5), (product("gone"), 2)])).unwrap();
        match events.as_slice() {
            [CartEvent::ItemsCheckedOut(e)] => {
                assert_eq!(e.items, vec![CartItem { product_id: product("mug"), quantity: 1 }]);
            }
            other => panic!("unexpected events {other:?}"),
        }
        assert!(cart.is_empty());

        assert!(cart.handle(&check_out(user, &[(product("mug"), 1)])).unwrap().is_empty());
    }

    #[test]
    fn other_users_cannot_touch_the_cart() {
        let owner = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(owner));
        execute(&mut cart, &add(owner, product("mug"), 1)).unwrap();

        let intruder = UserId::new();
        let err = cart
            .handle(&CartCommand::AddItem(AddItem {
                cart_id: CartId::for_user(owner),
                user_id: intruder,
                product_id: product("mug"),
                quantity: 1,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::Unauthorized);
    }
}
