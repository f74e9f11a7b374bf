//! Leveraged short example.
//!
//! A lender supplies base, a trader shorts it with quote margin, a month
//! of interest accrues and the trader buys the debt back after the price
//! drops.

use margin_engine::core::fixed_point::Fp96;
use margin_engine::prelude::*;
use rust_decimal_macros::dec;

fn main() {
    println!("╔══════════════════════════════════════════╗");
    println!("║  margin-engine: Leveraged Short Example  ║");
    println!("╚══════════════════════════════════════════╝\n");

    let price = Fp96::from_decimal(dec!(2000)).unwrap();
    let admin = AccountId::new("admin");
    let lender = AccountId::new("ETH-LENDER");
    let trader = AccountId::new("SHORT-TRADER");

    let mut pool = MarginlyPool::new(admin, MarginlyParams::default(), price, 0).unwrap();
    let mut venue = SimulatedVenue::new(price, 0);
    venue.mint(&lender, Token::Base, 1_000_000);
    venue.mint(&trader, Token::Quote, 400_000_000);

    println!("━━━ Step 1: Lender supplies 1,000,000 base ━━━\n");
    venue.execute(&mut pool, &lender, Call::deposit_base(1_000_000)).unwrap();

    println!("━━━ Step 2: Trader deposits 400,000,000 quote and shorts 500,000 base ━━━\n");
    let call = Call::DepositQuote {
        amount: 400_000_000,
        short_amount: 500_000,
        wrap_native: false,
        beneficiary: None,
    };
    venue.execute(&mut pool, &trader, call).unwrap();
    println!(
        "  Debt:       {} base\n  Collateral: {} quote\n",
        pool.real_debt_of(&trader, Token::Base).unwrap(),
        pool.real_collateral_of(&trader, Token::Quote).unwrap()
    );

    println!("━━━ Step 3: 30 days pass, price falls to 1,800 ━━━\n");
    venue.advance(30 * 86_400);
    venue.set_price(Fp96::from_decimal(dec!(1800)).unwrap());
    venue.execute(&mut pool, &lender, Call::Reinit).unwrap();
    println!(
        "  Debt:           {} base",
        pool.real_debt_of(&trader, Token::Base).unwrap()
    );
    println!(
        "  Lender balance: {} base\n",
        pool.real_collateral_of(&lender, Token::Base).unwrap()
    );

    println!("━━━ Step 4: Trader closes the short ━━━\n");
    venue.execute(&mut pool, &trader, Call::ClosePosition).unwrap();
    let left = pool.real_collateral_of(&trader, Token::Quote).unwrap();
    println!("  Quote left:  {}", left);
    println!(
        "  Profit:      {}\n",
        left as i128 - 400_000_000
    );

    println!("{}", pool.snapshot().unwrap());
}
